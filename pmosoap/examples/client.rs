//! Client de démonstration, à lancer contre `simple_server`
//!
//! ```bash
//! PMOSOAP_CONFIG__CLIENT__URL=http://127.0.0.1:8080/pathTo cargo run --example client
//! ```

use pmosoap::client::Client;
use pmosoap::config::SoapConfig;
use pmosoap::logs::init_logging;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename = "fooRequest")]
struct FooRequest {
    #[serde(rename = "Foo")]
    foo: String,
}

#[derive(Debug, Default, Deserialize)]
struct FooResponse {
    #[serde(rename = "Bar")]
    bar: String,
}

fn main() -> anyhow::Result<()> {
    let config = SoapConfig::load(None)?;
    init_logging(&config.log);

    let client = Client::from_config(&config.client);
    let mut response = FooResponse::default();
    let meta = client.call(
        "operationFoo",
        &FooRequest {
            foo: "hello i am foo".to_string(),
        },
        &mut response,
    )?;

    println!("{} {}", response.bar, meta.status);
    Ok(())
}
