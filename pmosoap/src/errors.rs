use thiserror::Error;

/// Grandes familles d'erreurs, utilisées pour classer un [`SoapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Échec d'envoi/réception au niveau HTTP
    Transport,
    /// Corps présent mais pas au format SOAP
    MalformedMessage,
    /// Enveloppe SOAP de forme invalide
    ProtocolShape,
    /// Aucun handler pour (path, action, élément)
    Routing,
    /// Échec de sérialisation / désérialisation
    Marshal,
    /// SOAP Fault reçu ou émis
    Fault,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),
    #[error("invalid HTTP request: {0}")]
    Request(#[from] ureq::http::Error),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn other(message: impl Into<String>) -> Self {
        TransportError::Other(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("unknown path \"{0}\"")]
    UnknownPath(String),
    #[error("unknown action \"{0}\"")]
    UnknownAction(String),
    #[error("no action handler for content type: \"{0}\"")]
    NoHandler(String),
}

/// Transition illégale de la machine à états du [`crate::server::ResponseSink`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("response header already sent")]
    HeaderAlreadySent,
    #[error("handler already started the response output")]
    OutputAlreadyStarted,
}

#[derive(Error, Debug)]
pub enum SoapError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("this is not a SOAP-message: \n{0}")]
    NotSoap(String),

    #[error("multipart message does not contain a soapy part")]
    NoSoapPart,

    #[error("malformed multipart message: {0}")]
    Multipart(String),

    #[error("missing SOAP Envelope, found <{0}>")]
    MissingEnvelope(String),

    #[error("missing SOAP Body")]
    MissingBody,

    #[error("SOAP Body has no content element")]
    EmptyBody,

    #[error(
        "found multiple elements inside SOAP body; not wrapped-document/literal WS-I compliant"
    )]
    MultipleBodyElements,

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("invalid UTF-8 in SOAP message: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("could not unmarshal: {0}")]
    Unmarshal(#[from] quick_xml::DeError),

    #[error("could not marshal: {0}")]
    Marshal(#[from] quick_xml::SeError),

    #[error("I/O error while writing XML: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not build envelope: {0}")]
    Tree(#[from] xmltree::ParseError),

    #[error("could not write envelope: {0}")]
    Emit(#[from] xmltree::Error),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Fault distant, déjà mis en forme pour l'affichage
    #[error("{rendered}")]
    Fault { status: u16, rendered: String },
}

impl SoapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SoapError::Transport(_) => ErrorKind::Transport,
            SoapError::NotSoap(_) | SoapError::NoSoapPart | SoapError::Multipart(_) => {
                ErrorKind::MalformedMessage
            }
            SoapError::MissingEnvelope(_)
            | SoapError::MissingBody
            | SoapError::EmptyBody
            | SoapError::MultipleBodyElements => ErrorKind::ProtocolShape,
            SoapError::Routing(_) => ErrorKind::Routing,
            SoapError::Fault { .. } => ErrorKind::Fault,
            SoapError::Xml(_)
            | SoapError::Escape(_)
            | SoapError::Utf8(_)
            | SoapError::Io(_)
            | SoapError::Unmarshal(_)
            | SoapError::Marshal(_)
            | SoapError::Tree(_)
            | SoapError::Emit(_) => ErrorKind::Marshal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_messages() {
        assert_eq!(
            RoutingError::NoHandler("barRequest".to_string()).to_string(),
            "no action handler for content type: \"barRequest\""
        );
        assert_eq!(
            RoutingError::UnknownAction("x".to_string()).to_string(),
            "unknown action \"x\""
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SoapError::NoSoapPart.kind(), ErrorKind::MalformedMessage);
        assert_eq!(
            SoapError::MultipleBodyElements.kind(),
            ErrorKind::ProtocolShape
        );
        assert_eq!(
            SoapError::from(RoutingError::UnknownPath("/".into())).kind(),
            ErrorKind::Routing
        );
        assert_eq!(
            SoapError::from(TransportError::other("boom")).kind(),
            ErrorKind::Transport
        );
    }
}
