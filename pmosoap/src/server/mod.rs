//! # Serveur SOAP
//!
//! Chaque requête traverse la même machine à états :
//!
//! ```text
//! ReceiveBody → NamespaceNormalize → ProbeType → ResolveHandler
//!             → DecodeTyped → Invoke → EncodeResult → Send
//! ```
//!
//! Toute étape qui échoue produit une enveloppe ne contenant qu'un fault
//! (statut 500), avec le content-type et le namespace de la version
//! configurée. Le routage se fait sur (path de l'URL, `SOAPAction`, nom
//! local de l'élément du Body), dans cet ordre.
//!
//! ## Example
//!
//! ```no_run
//! use pmosoap::server::SoapServer;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Deserialize)]
//! struct FooRequest {
//!     #[serde(rename = "Foo")]
//!     foo: String,
//! }
//!
//! #[derive(Serialize)]
//! #[serde(rename = "fooResponse")]
//! struct FooResponse {
//!     #[serde(rename = "Bar")]
//!     bar: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! let server = SoapServer::builder()
//!     .register_handler(
//!         "/pathTo",
//!         "testPostAction",
//!         "fooRequest",
//!         FooRequest::default,
//!         |request: FooRequest, _, _| {
//!             Ok(FooResponse { bar: format!("Hello {:?}", request.foo) })
//!         },
//!     )
//!     .build();
//!
//! server.listen_and_serve("127.0.0.1:8080").await
//! # }
//! ```

mod registry;
mod sink;

pub use registry::{Registry, RegistryBuilder, RequestContext};
pub use sink::{ResponseSink, SinkState};

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::{HeaderMap, Method, StatusCode, header},
    response::Response,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::soap::{
    Fault, SoapVersion, build_fault_envelope, multipart::MediaType, namespace, probe_body_element,
};
use registry::OperationError;

/// Taille maximale par défaut d'un corps de requête
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const NOT_POST: &str = "this is a soap service - you have to POST soap requests";

/// Configuration d'un [`SoapServer`] et enregistrement des handlers
pub struct ServerBuilder {
    registry: RegistryBuilder,
    version: SoapVersion,
    max_body_size: usize,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            registry: RegistryBuilder::new(),
            version: SoapVersion::V11,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .soap_version(config.version)
            .max_body_size(config.max_body_size)
    }

    pub fn soap_version(mut self, version: SoapVersion) -> Self {
        self.version = version;
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enregistre un handler pour (path, action, élément du Body).
    ///
    /// # Arguments
    ///
    /// * `factory` - Construit l'instance de requête que le décodage remplit
    /// * `handler` - Reçoit la requête décodée, la sortie HTTP et le contexte ;
    ///   s'il écrit lui-même dans la [`ResponseSink`], sa valeur de retour
    ///   n'est pas encodée
    pub fn register_handler<Req, Resp, F, H>(
        mut self,
        path: &str,
        action: &str,
        element: &str,
        factory: F,
        handler: H,
    ) -> Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        F: Fn() -> Req + Send + Sync + 'static,
        H: Fn(Req, &mut ResponseSink, &RequestContext) -> anyhow::Result<Resp>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(path, action, element, factory, handler);
        self
    }

    pub fn build(self) -> SoapServer {
        let registry = self.registry.build();
        info!(
            handlers = registry.len(),
            version = %self.version,
            "SOAP server ready"
        );
        SoapServer {
            inner: Arc::new(Inner {
                registry,
                version: self.version,
                max_body_size: self.max_body_size,
            }),
        }
    }
}

struct Inner {
    registry: Registry,
    version: SoapVersion,
    max_body_size: usize,
}

/// Serveur SOAP figé, clonable à moindre coût
#[derive(Clone)]
pub struct SoapServer {
    inner: Arc<Inner>,
}

impl SoapServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn version(&self) -> SoapVersion {
        self.inner.version
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Traite une requête déjà reçue.
    ///
    /// `body` contient l'erreur de lecture si le corps n'a pas pu être lu.
    /// Produit toujours une réponse HTTP complète.
    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Result<&[u8], &str>,
    ) -> Response {
        let sink = ResponseSink::new();
        let action = soap_action(headers);
        info!(%method, path, action = %action, "SOAP request");

        if *method != Method::POST {
            return self.fault_response(sink, Fault::client(NOT_POST));
        }

        // ReceiveBody
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                return self.fault_response(
                    sink,
                    Fault::client(format!("could not read POST: {}", e)),
                );
            }
        };

        // NamespaceNormalize
        let xml = namespace::normalize(body);
        debug!(envelope = %String::from_utf8_lossy(&xml), "incoming SOAP envelope");

        let context = RequestContext {
            path: path.to_string(),
            action,
            headers: headers.clone(),
        };

        let elements = match self.inner.registry.actions(path, &context.action) {
            Ok(elements) => elements,
            Err(e) => return self.fault_response(sink, Fault::client(e.to_string())),
        };

        // ProbeType
        let element = match probe_body_element(&xml) {
            Ok(element) => element,
            Err(e) => {
                return self.fault_response(
                    sink,
                    Fault::client(format!("could not probe soap body content: {}", e)),
                );
            }
        };
        debug!(element = %element, "found body content type");

        // ResolveHandler
        let operation = match Registry::operation(elements, &element) {
            Ok(operation) => operation,
            Err(e) => return self.fault_response(sink, Fault::client(e.to_string())),
        };

        // DecodeTyped → Invoke → EncodeResult
        let mut sink = sink;
        let fault = match operation.invoke(&xml, &mut sink, &context) {
            Ok(Some(envelope)) => {
                let envelope = self.inner.version.to_wire(envelope);
                return match sink.write_envelope(
                    StatusCode::OK,
                    self.inner.version.content_type(),
                    envelope,
                ) {
                    Ok(()) => sink.into_response(),
                    Err(e) => {
                        error!("cannot write SOAP response: {}", e);
                        sink.into_response()
                    }
                };
            }
            Ok(None) => return sink.into_response(),
            Err(OperationError::Unmarshal(e)) => {
                Fault::client(format!("could not unmarshal request: {}", e))
            }
            Err(OperationError::Handler(e)) => handler_fault(e),
            Err(OperationError::Marshal(e)) => {
                Fault::server(format!("could not marshal response: {}", e))
            }
        };

        self.fault_response(sink, fault)
    }

    /// Écrit un fault dans la sortie, sauf si le handler l'a déjà utilisée.
    fn fault_response(&self, mut sink: ResponseSink, fault: Fault) -> Response {
        error!(code = %fault.code, "SOAP Fault: {}", fault);

        let envelope = match build_fault_envelope(&fault) {
            Ok(envelope) => self.inner.version.to_wire(envelope),
            Err(e) => {
                error!("could not marshal soap fault: {}", e);
                if !sink.is_started() {
                    let _ = sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                    sink.write_body(
                        format!(
                            "could not marshal soap fault for: {} xmlError: {}",
                            fault, e
                        )
                        .as_bytes(),
                    );
                }
                return sink.into_response();
            }
        };

        if let Err(e) = sink.write_envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            self.inner.version.content_type(),
            envelope,
        ) {
            warn!("fault not sent, keeping handler output: {}", e);
        }
        sink.into_response()
    }

    /// Router axum dont la route par défaut alimente [`SoapServer::dispatch`].
    ///
    /// Les handlers s'exécutent sur le pool bloquant de tokio.
    pub fn into_router(self) -> Router {
        Router::new().fallback(move |request: Request| {
            let server = self.clone();
            async move { server.handle(request).await }
        })
    }

    async fn handle(self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.inner.max_body_size)
            .await
            .map_err(|e| e.to_string());

        let server = self.clone();
        let result = tokio::task::spawn_blocking(move || {
            server.dispatch(
                &parts.method,
                parts.uri.path(),
                &parts.headers,
                body.as_deref().map_err(String::as_str),
            )
        })
        .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                error!("SOAP handler task failed: {}", e);
                self.fault_response(ResponseSink::new(), Fault::server("handler task failed"))
            }
        }
    }

    /// Sert les requêtes acceptées sur `listener`.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("SOAP server listening on http://{}", addr);
        }
        axum::serve(listener, self.into_router().into_make_service()).await
    }

    pub async fn listen_and_serve(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }
}

/// Un handler peut choisir son fault en renvoyant un [`Fault`] ; sinon le
/// message de l'erreur devient un fault `Server`.
fn handler_fault(error: anyhow::Error) -> Fault {
    match error.downcast::<Fault>() {
        Ok(fault) => fault,
        Err(error) => Fault::server(error.to_string()),
    }
}

/// Clé de routage `SOAPAction`, sans guillemets.
///
/// En SOAP 1.2, l'action peut être portée par le paramètre `action` du
/// Content-Type.
fn soap_action(headers: &HeaderMap) -> String {
    if let Some(value) = headers.get("SOAPAction") {
        return String::from_utf8_lossy(value.as_bytes())
            .trim()
            .trim_matches('"')
            .to_string();
    }

    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(MediaType::parse)
        .and_then(|media| media.param("action").map(str::to_string))
        .unwrap_or_default()
}
