//! # pmosoap
//!
//! Client et serveur SOAP 1.1 / 1.2 pour des messages *wrapped
//! document/literal* : un seul élément applicatif dans le Body.
//!
//! - [`soap`] : codec d'enveloppes, faults, traduction de namespaces,
//!   extraction multipart
//! - [`client`] : appel synchrone d'une opération distante
//! - [`server`] : routage (path, `SOAPAction`, élément du Body) vers des
//!   handlers typés, servi par axum
//! - [`config`] / [`logs`] : configuration YAML en couches et traces

pub mod client;
pub mod config;
pub mod errors;
pub mod logs;
pub mod server;
pub mod soap;

pub use client::{BasicAuth, Client, ResponseMeta, Transport, UreqTransport};
pub use errors::{ErrorKind, RoutingError, SinkError, SoapError, TransportError};
pub use server::{RequestContext, ResponseSink, ServerBuilder, SoapServer};
pub use soap::{Fault, SoapVersion};
