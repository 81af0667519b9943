//! Client SOAP
//!
//! Un [`Client`] réalise un aller-retour synchrone : encodage de la requête,
//! envoi HTTP via un [`Transport`], puis décodage de la réponse (ou du fault)
//! dans la destination fournie par l'appelant.
//!
//! ```no_run
//! use pmosoap::client::Client;
//! use pmosoap::soap::SoapVersion;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! #[serde(rename = "fooRequest")]
//! struct FooRequest {
//!     #[serde(rename = "Foo")]
//!     foo: String,
//! }
//!
//! #[derive(Default, Deserialize)]
//! struct FooResponse {
//!     #[serde(rename = "Bar")]
//!     bar: String,
//! }
//!
//! let client = Client::new("http://127.0.0.1:8080/pathTo", None).soap_version(SoapVersion::V12);
//! let mut response = FooResponse::default();
//! client.call("testPostAction", &FooRequest { foo: "hello".into() }, &mut response)?;
//! println!("{}", response.bar);
//! # Ok::<(), pmosoap::SoapError>(())
//! ```

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};
use ureq::{
    Agent,
    http::{HeaderMap, Request, Response, StatusCode, header},
};

use crate::config::ClientConfig;
use crate::errors::{SoapError, TransportError};
use crate::soap::{
    Decoded, SoapVersion, build_envelope,
    multipart::{MediaType, extract_soap_part},
    namespace, parse_envelope_into,
};

pub const DEFAULT_USER_AGENT: &str = concat!("pmosoap/", env!("CARGO_PKG_VERSION"));

/// Marqueurs d'une balise d'ouverture d'enveloppe dans un corps non multipart.
/// `<Envelope` couvre les enveloppes sans préfixe émises par ce serveur.
const SOAP_MARKERS: [&[u8]; 3] = [b"<soap", b"<SOAP", b"<Envelope"];

/// Identifiants pour l'authentification HTTP Basic
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BasicAuth {
    pub login: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Valeur de l'en-tête `Authorization`
    pub fn header_value(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.login, self.password))
        )
    }
}

/// Collaborateur HTTP du client.
///
/// Toute fermeture `Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError>`
/// est un transport, ce qui permet de simuler un serveur dans les tests.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> + Send + Sync,
{
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        self(request)
    }
}

/// Transport bloquant basé sur un agent ureq.
///
/// Les codes HTTP d'erreur ne sont pas des erreurs de transport : un fault
/// SOAP arrive en général avec un statut 500 et doit rester lisible.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();

        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        let response = self.agent.run(request)?;
        let (parts, mut body) = response.into_parts();
        let bytes = body.read_to_vec()?;
        Ok(Response::from_parts(parts, bytes))
    }
}

/// Métadonnées HTTP de la réponse, rendues à l'appelant
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Client SOAP, partageable entre threads
#[derive(Clone)]
pub struct Client {
    url: String,
    auth: Option<BasicAuth>,
    version: SoapVersion,
    user_agent: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("version", &self.version)
            .field("user_agent", &self.user_agent)
            .field("auth", &self.auth.as_ref().map(|a| &a.login))
            .finish()
    }
}

impl Client {
    /// Client SOAP 1.1 utilisant le transport ureq par défaut
    pub fn new(url: impl Into<String>, auth: Option<BasicAuth>) -> Self {
        Self {
            url: url.into(),
            auth,
            version: SoapVersion::V11,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            transport: Arc::new(UreqTransport::new()),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let transport = match config.timeout_secs {
            Some(secs) => UreqTransport::with_timeout(Duration::from_secs(secs)),
            None => UreqTransport::new(),
        };

        let mut client = Self::new(config.url.clone(), config.auth.clone())
            .soap_version(config.version)
            .with_transport(transport);
        if let Some(ua) = &config.user_agent {
            client = client.user_agent(ua.clone());
        }
        client
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn soap_version(mut self, version: SoapVersion) -> Self {
        self.version = version;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// Appelle `action` avec `request` et décode la réponse dans `response`.
    ///
    /// Une réponse vide est un succès : `response` n'est pas modifiée.
    /// Utiliser [`crate::soap::Discard`] quand seul le statut importe.
    ///
    /// # Errors
    ///
    /// - [`SoapError::Transport`] sans nouvelle tentative
    /// - [`SoapError::NotSoap`] si le corps ne contient aucune balise SOAP
    /// - [`SoapError::NoSoapPart`] pour une réponse multipart sans enveloppe
    /// - [`SoapError::Fault`] si le serveur a répondu par un fault ; le
    ///   message est le fault mis en forme
    pub fn call<Req, Resp>(
        &self,
        action: &str,
        request: &Req,
        response: &mut Resp,
    ) -> Result<ResponseMeta, SoapError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let envelope = self.version.to_wire(build_envelope(request)?);
        debug!(
            action,
            envelope = %String::from_utf8_lossy(&envelope),
            "SOAP request envelope"
        );

        let http_request = self.build_request(action, envelope)?;
        info!(url = %self.url, action, version = %self.version, "Sending SOAP request");

        let (parts, body) = self.transport.send(http_request)?.into_parts();
        let meta = ResponseMeta {
            status: parts.status,
            headers: parts.headers,
        };
        debug!(status = %meta.status, len = body.len(), "SOAP response received");

        let payload = match response_media_type(&meta.headers) {
            Some(media) if media.is_multipart() => {
                let boundary = media.boundary().ok_or_else(|| {
                    SoapError::Multipart("missing boundary parameter".to_string())
                })?;
                extract_soap_part(&body, boundary)?
            }
            _ => {
                if body.is_empty() {
                    debug!("empty SOAP response body");
                    return Ok(meta);
                }
                if !looks_like_soap(&body) {
                    return Err(SoapError::NotSoap(
                        String::from_utf8_lossy(&body).into_owned(),
                    ));
                }
                &body[..]
            }
        };

        let xml = namespace::normalize(payload);
        match parse_envelope_into(&xml, Some(response))? {
            Decoded::Content { element_name } => {
                debug!(element = %element_name, "SOAP response decoded");
                Ok(meta)
            }
            Decoded::Fault(fault) => {
                warn!(status = %meta.status, code = %fault.code, "SOAP Fault received: {}", fault);
                Err(SoapError::Fault {
                    status: meta.status.as_u16(),
                    rendered: fault.render(),
                })
            }
        }
    }

    fn build_request(
        &self,
        action: &str,
        envelope: Vec<u8>,
    ) -> Result<Request<Vec<u8>>, SoapError> {
        let mut builder = Request::post(self.url.as_str())
            .header(header::CONTENT_TYPE, self.version.content_type())
            .header(header::USER_AGENT, self.user_agent.as_str());

        if !action.is_empty() {
            builder = builder.header("SOAPAction", action);
        }
        if let Some(auth) = &self.auth {
            builder = builder.header(header::AUTHORIZATION, auth.header_value());
        }

        Ok(builder
            .body(envelope)
            .map_err(TransportError::from)?)
    }
}

fn response_media_type(headers: &HeaderMap) -> Option<MediaType> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media = MediaType::parse(value);
    if media.is_none() {
        warn!(content_type = value, "unparsable response Content-Type");
    }
    media
}

fn looks_like_soap(body: &[u8]) -> bool {
    SOAP_MARKERS
        .iter()
        .any(|marker| body.windows(marker.len()).any(|w| w == *marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        let auth = BasicAuth::new("Aladdin", "open sesame");
        assert_eq!(auth.header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn test_looks_like_soap() {
        assert!(looks_like_soap(b"<soap:Envelope>"));
        assert!(looks_like_soap(b"<?xml version=\"1.0\"?>\n<SOAP-ENV:Envelope>"));
        assert!(looks_like_soap(b"<Envelope xmlns=\"x\">"));
        assert!(!looks_like_soap(b"<s:Envelope>"));
        assert!(!looks_like_soap(b"<seife12:Envelope><seife:Body/></seife12:Envelope>"));
        assert!(!looks_like_soap(b"<html><body>Not Found</body></html>"));
    }

    #[test]
    fn test_build_request_headers() {
        let client = Client::new("http://localhost/soap", Some(BasicAuth::new("u", "p")))
            .soap_version(SoapVersion::V12);
        let request = client.build_request("doIt", b"<x/>".to_vec()).unwrap();

        assert_eq!(request.method(), "POST");
        assert_eq!(request.uri(), "http://localhost/soap");
        let headers = request.headers();
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "application/soap+xml; charset=\"utf-8\""
        );
        assert_eq!(headers["SOAPAction"], "doIt");
        assert_eq!(headers[header::USER_AGENT], DEFAULT_USER_AGENT);
        assert!(headers[header::AUTHORIZATION].to_str().unwrap().starts_with("Basic "));
    }

    #[test]
    fn test_empty_action_has_no_header() {
        let client = Client::new("http://localhost/soap", None);
        let request = client.build_request("", Vec::new()).unwrap();
        assert!(request.headers().get("SOAPAction").is_none());
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_from_config() {
        let config = crate::config::SoapConfig::from_yaml(
            "client:\n  url: \"http://example.org/ws\"\n  version: \"1.2\"\n  user_agent: \"agent/1\"\n",
        )
        .unwrap();
        let client = Client::from_config(&config.client);
        assert_eq!(client.url(), "http://example.org/ws");
        assert_eq!(client.version(), SoapVersion::V12);
        assert_eq!(client.user_agent, "agent/1");
    }
}
