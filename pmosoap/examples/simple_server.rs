//! Petit serveur de démonstration
//!
//! ```bash
//! cargo run --example simple_server
//! ```
//!
//! Puis, dans un autre terminal : `cargo run --example client`.

use pmosoap::config::SoapConfig;
use pmosoap::logs::init_logging;
use pmosoap::server::ServerBuilder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
struct FooRequest {
    #[serde(rename = "Foo")]
    foo: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "fooResponse")]
struct FooResponse {
    #[serde(rename = "Bar")]
    bar: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SoapConfig::load(None)?;
    init_logging(&config.log);
    tracing::info!("Starting pmosoap demo server...");

    let server = ServerBuilder::from_config(&config.server)
        .register_handler(
            "/pathTo",
            "operationFoo", // SOAPAction
            "fooRequest",   // élément du Body
            FooRequest::default,
            |request: FooRequest, _, context| {
                tracing::info!(path = %context.path, "fooRequest: {:?}", request);
                Ok(FooResponse {
                    bar: format!("Hello \"{}\"", request.foo),
                })
            },
        )
        .build();

    server.listen_and_serve(config.server.bind.as_str()).await?;
    Ok(())
}
