//! # Module SOAP - Simple Object Access Protocol
//!
//! Ce module implémente le codec d'enveloppes SOAP 1.1 / 1.2 utilisé aussi bien
//! par le [`crate::client::Client`] que par le [`crate::server::SoapServer`].
//!
//! ## Fonctionnalités
//!
//! - ✅ Construction d'enveloppes à partir de n'importe quelle valeur `Serialize`
//! - ✅ Décodage en flux du Body : contenu applicatif typé ou SOAP Fault
//! - ✅ Sonde (*probe*) du nom de l'élément du Body pour le routage
//! - ✅ Traduction des namespaces SOAP 1.1 ⇄ SOAP 1.2
//! - ✅ Extraction de la partie SOAP d'une réponse multipart
//!
//! ## Architecture
//!
//! - [`Envelope`] : Enveloppe SOAP décodée
//! - [`Fault`] : Erreur SOAP
//! - [`build_envelope`] / [`parse_envelope`] : encodage / décodage
//! - [`namespace`] : traduction entre les deux dialectes
//!
//! En interne, les enveloppes sont toujours dans le namespace SOAP 1.1 ;
//! la traduction vers 1.2 se fait en frontière, sur les octets.
//!
//! ## Example
//!
//! ```
//! use pmosoap::soap::{BodyContent, build_envelope, parse_envelope};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! #[serde(rename = "fooRequest")]
//! struct FooRequest {
//!     #[serde(rename = "Foo")]
//!     foo: String,
//! }
//!
//! let request = FooRequest { foo: "hello world".to_string() };
//! let xml = build_envelope(&request).unwrap();
//!
//! let envelope = parse_envelope::<FooRequest>(&xml).unwrap();
//! assert_eq!(envelope.body.element_name, "fooRequest");
//! assert!(matches!(envelope.body.content, BodyContent::Content(ref r) if *r == request));
//! ```

mod builder;
mod envelope;
mod fault;
pub mod multipart;
pub mod namespace;
mod parser;

use serde::Deserialize;

pub use builder::{build_envelope, build_fault_envelope};
pub use envelope::{Body, BodyContent, Discard, Envelope, Header};
pub use fault::Fault;
pub use parser::{Decoded, parse_envelope, parse_envelope_into, probe_body_element};

pub const NAMESPACE_SOAP11: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const NAMESPACE_SOAP12: &str = "http://www.w3.org/2003/05/soap-envelope";

pub const CONTENT_TYPE_SOAP11: &str = "text/xml; charset=\"utf-8\"";
pub const CONTENT_TYPE_SOAP12: &str = "application/soap+xml; charset=\"utf-8\"";

/// Codes de fault SOAP standards (non préfixés : l'enveloppe déclare le
/// namespace SOAP comme namespace par défaut)
pub mod fault_codes {
    /// Le message de l'appelant est en cause
    pub const CLIENT: &str = "Client";

    /// Le traitement a échoué côté serveur
    pub const SERVER: &str = "Server";
}

/// Version du protocole SOAP parlée sur le fil
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SoapVersion {
    #[default]
    #[serde(rename = "1.1")]
    V11,
    #[serde(rename = "1.2")]
    V12,
}

impl SoapVersion {
    pub fn content_type(self) -> &'static str {
        match self {
            SoapVersion::V11 => CONTENT_TYPE_SOAP11,
            SoapVersion::V12 => CONTENT_TYPE_SOAP12,
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            SoapVersion::V11 => NAMESPACE_SOAP11,
            SoapVersion::V12 => NAMESPACE_SOAP12,
        }
    }

    /// Traduit une enveloppe interne (1.1) vers le dialecte de cette version.
    pub fn to_wire(self, xml: Vec<u8>) -> Vec<u8> {
        match self {
            SoapVersion::V11 => xml,
            SoapVersion::V12 => namespace::to_soap12(&xml),
        }
    }
}

impl std::fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoapVersion::V11 => f.write_str("1.1"),
            SoapVersion::V12 => f.write_str("1.2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_headers() {
        assert_eq!(SoapVersion::V11.content_type(), "text/xml; charset=\"utf-8\"");
        assert_eq!(
            SoapVersion::V12.content_type(),
            "application/soap+xml; charset=\"utf-8\""
        );
        assert_eq!(SoapVersion::default(), SoapVersion::V11);
    }

    #[test]
    fn test_version_from_yaml() {
        let v: SoapVersion = serde_yaml::from_str("\"1.2\"").unwrap();
        assert_eq!(v, SoapVersion::V12);
    }

    #[test]
    fn test_to_wire() {
        let xml = format!("<Envelope xmlns=\"{}\"/>", NAMESPACE_SOAP11).into_bytes();
        let wire = SoapVersion::V12.to_wire(xml.clone());
        assert!(String::from_utf8(wire).unwrap().contains(NAMESPACE_SOAP12));
        assert_eq!(SoapVersion::V11.to_wire(xml.clone()), xml);
    }
}
