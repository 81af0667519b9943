use std::sync::{Arc, Mutex};

use pmosoap::client::{BasicAuth, Client};
use pmosoap::errors::{ErrorKind, SoapError, TransportError};
use pmosoap::soap::{Discard, SoapVersion};
use serde::{Deserialize, Serialize};
use ureq::http::{Request, Response, header};

#[derive(Debug, Serialize)]
#[serde(rename = "fooRequest")]
struct FooRequest {
    #[serde(rename = "Foo")]
    foo: String,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
struct FooResponse {
    #[serde(rename = "Bar")]
    bar: String,
}

const SOAP11_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <fooResponse>
      <Bar>I love deadlines</Bar>
    </fooResponse>
  </soap:Body>
</soap:Envelope>"#;

const SOAP12_RESPONSE: &str = r#"<soap12:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xmlns:xsd="http://www.w3.org/2001/XMLSchema"
  xmlns:soap12="http://www.w3.org/2003/05/soap-envelope">
  <soap12:Body>
    <FooResponse xmlns="http://xmlme.com/WebServices">
      <Bar>I love deadlines. I like the whooshing sound they make as they fly by.</Bar>
    </FooResponse>
  </soap12:Body>
</soap12:Envelope>"#;

const FAULT_RESPONSE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Server</faultcode>
      <faultstring>backend exploded</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

type Captured = Arc<Mutex<Option<Request<Vec<u8>>>>>;

/// Transport qui mémorise la requête et renvoie une réponse fixe
fn fixed_transport(
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> (
    Captured,
    impl Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> + Send + Sync + 'static,
) {
    let captured: Captured = Arc::new(Mutex::new(None));
    let sink = captured.clone();
    let transport = move |request: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, TransportError> {
        *sink.lock().unwrap() = Some(request);
        Ok(Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .body(body.clone())?)
    };
    (captured, transport)
}

fn request() -> FooRequest {
    FooRequest {
        foo: "hello world".to_string(),
    }
}

fn multipart(boundary: &str, parts: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/octet-stream\r\n\r\n");
        body.push_str(part);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    body.into_bytes()
}

#[test]
fn test_call_success_and_request_headers() {
    let (captured, transport) =
        fixed_transport(200, "text/xml; charset=utf-8", SOAP11_RESPONSE.into());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse::default();
    let meta = client.call("testPostAction", &request(), &mut response).unwrap();

    assert_eq!(meta.status, 200);
    assert_eq!(response.bar, "I love deadlines");

    let sent = captured.lock().unwrap().take().unwrap();
    assert_eq!(sent.method(), "POST");
    assert_eq!(sent.uri(), "http://soap.example.org/ws");
    assert_eq!(sent.headers()["SOAPAction"], "testPostAction");
    assert_eq!(
        sent.headers()[header::CONTENT_TYPE],
        "text/xml; charset=\"utf-8\""
    );
    assert!(
        sent.headers()[header::USER_AGENT]
            .to_str()
            .unwrap()
            .starts_with("pmosoap/")
    );

    let body = String::from_utf8(sent.body().clone()).unwrap();
    assert!(body.contains("http://schemas.xmlsoap.org/soap/envelope/"));
    assert!(body.contains("<Foo>hello world</Foo>"));
}

#[test]
fn test_call_soap12() {
    let (captured, transport) = fixed_transport(
        200,
        "application/soap+xml; charset=utf-8",
        SOAP12_RESPONSE.into(),
    );
    let client = Client::new("http://soap.example.org/ws", None)
        .soap_version(SoapVersion::V12)
        .with_transport(transport);

    let mut response = FooResponse::default();
    client.call("", &request(), &mut response).unwrap();
    assert_eq!(
        response.bar,
        "I love deadlines. I like the whooshing sound they make as they fly by."
    );

    let sent = captured.lock().unwrap().take().unwrap();
    assert!(sent.headers().get("SOAPAction").is_none());
    assert_eq!(
        sent.headers()[header::CONTENT_TYPE],
        "application/soap+xml; charset=\"utf-8\""
    );
    let body = String::from_utf8(sent.body().clone()).unwrap();
    assert!(body.contains("http://www.w3.org/2003/05/soap-envelope"));
    assert!(!body.contains("http://schemas.xmlsoap.org/soap/envelope/"));
}

#[test]
fn test_call_basic_auth() {
    let (captured, transport) = fixed_transport(200, "text/xml", SOAP11_RESPONSE.into());
    let client = Client::new(
        "http://soap.example.org/ws",
        Some(BasicAuth::new("Aladdin", "open sesame")),
    )
    .with_transport(transport);

    client
        .call("testPostAction", &request(), &mut Discard)
        .unwrap();

    let sent = captured.lock().unwrap().take().unwrap();
    assert_eq!(
        sent.headers()[header::AUTHORIZATION],
        "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
    );
}

#[test]
fn test_call_not_soap() {
    let (_, transport) = fixed_transport(200, "text/html", b"<html>Service moved</html>".to_vec());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse::default();
    let err = client.call("a", &request(), &mut response).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedMessage);
    let message = err.to_string();
    assert!(message.starts_with("this is not a SOAP-message"));
    assert!(message.contains("<html>Service moved</html>"));
    assert_eq!(response, FooResponse::default());
}

#[test]
fn test_call_foreign_envelope_prefix_is_not_soap() {
    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<seife12:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xmlns:xsd="http://www.w3.org/2001/XMLSchema"
  xmlns:soap12="http://www.w3.org/2003/05/soap-envelope">
  <seife:Body></seife:Body>
</seife:Envelope>"#;
    let (_, transport) = fixed_transport(200, "text/xml", body.into());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse::default();
    let err = client.call("MySOAPAction", &request(), &mut response).unwrap_err();

    assert!(matches!(err, SoapError::NotSoap(_)));
    let message = err.to_string();
    assert!(message.starts_with("this is not a SOAP-message"));
    assert!(message.contains(body));
    assert_eq!(response, FooResponse::default());
}

#[test]
fn test_call_whitespace_body_is_not_soap() {
    let (_, transport) = fixed_transport(200, "text/xml", b"\n  \n".to_vec());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let err = client.call("a", &request(), &mut Discard).unwrap_err();
    assert!(matches!(err, SoapError::NotSoap(_)));
}

#[test]
fn test_call_empty_body() {
    let (_, transport) = fixed_transport(200, "text/xml", Vec::new());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse {
        bar: "untouched".to_string(),
    };
    let meta = client.call("a", &request(), &mut response).unwrap();

    assert_eq!(meta.status, 200);
    assert_eq!(response.bar, "untouched");
}

#[test]
fn test_call_multipart() {
    let body = multipart(
        "MIMEBoundary",
        &["binary attachment", SOAP11_RESPONSE.trim_start_matches(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
        )],
    );
    let (_, transport) = fixed_transport(
        200,
        "multipart/related; type=\"text/xml\"; boundary=\"MIMEBoundary\"",
        body,
    );
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse::default();
    client.call("a", &request(), &mut response).unwrap();
    assert_eq!(response.bar, "I love deadlines");
}

#[test]
fn test_call_multipart_without_soap_part() {
    let body = multipart("b", &["<wrong></wrong>", "plain text"]);
    let (_, transport) = fixed_transport(200, "multipart/mixed; boundary=b", body);
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse::default();
    let err = client.call("a", &request(), &mut response).unwrap_err();

    assert!(matches!(err, SoapError::NoSoapPart));
    assert_eq!(
        err.to_string(),
        "multipart message does not contain a soapy part"
    );
    assert_eq!(response, FooResponse::default());
}

#[test]
fn test_call_fault() {
    let (_, transport) = fixed_transport(500, "text/xml", FAULT_RESPONSE.into());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let mut response = FooResponse::default();
    let err = client.call("a", &request(), &mut response).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fault);
    match &err {
        SoapError::Fault { status, .. } => assert_eq!(*status, 500),
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("<faultcode>soap:Server</faultcode>"));
    assert!(message.contains("<faultstring>backend exploded</faultstring>"));
    assert!(!message.contains("xmlns"));
}

#[test]
fn test_call_multiple_body_elements() {
    let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body><a/><b/></soap:Body>
</soap:Envelope>"#;
    let (_, transport) = fixed_transport(200, "text/xml", body.into());
    let client = Client::new("http://soap.example.org/ws", None).with_transport(transport);

    let err = client.call("a", &request(), &mut Discard).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolShape);
    assert_eq!(
        err.to_string(),
        "found multiple elements inside SOAP body; not wrapped-document/literal WS-I compliant"
    );
}

#[test]
fn test_call_transport_error() {
    let client = Client::new("http://soap.example.org/ws", None).with_transport(
        |_: Request<Vec<u8>>| -> Result<Response<Vec<u8>>, TransportError> {
            Err(TransportError::other("connection refused"))
        },
    );

    let err = client.call("a", &request(), &mut Discard).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.to_string(), "connection refused");
}
