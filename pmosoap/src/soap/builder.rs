//! Construction d'enveloppes SOAP

use serde::Serialize;
use xmltree::{Element, XMLNode};

use super::{Fault, NAMESPACE_SOAP11};
use crate::errors::SoapError;

fn build_soap_envelope_with_body(body_child: Element) -> Result<Vec<u8>, SoapError> {
    // Header (vide, mais toujours présent)
    let header = Element::new("Header");

    // Body
    let mut body = Element::new("Body");
    body.children.push(XMLNode::Element(body_child));

    // Envelope
    let mut envelope = Element::new("Envelope");
    envelope
        .attributes
        .insert("xmlns".to_string(), NAMESPACE_SOAP11.to_string());
    envelope.children.push(XMLNode::Element(header));
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = xmltree::EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(buf)
}

/// Construit une enveloppe SOAP 1.1 contenant `payload` comme unique
/// élément du Body.
///
/// Le nom de l'élément est celui donné par serde (nom du type ou
/// `#[serde(rename = "...")]`).
///
/// # Returns
///
/// XML indenté de l'enveloppe
pub fn build_envelope<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, SoapError> {
    let xml = quick_xml::se::to_string(payload)?;
    let content = Element::parse(xml.as_bytes())?;

    build_soap_envelope_with_body(content)
}

/// Construit une enveloppe SOAP 1.1 dont le Body ne contient qu'un fault.
pub fn build_fault_envelope(fault: &Fault) -> Result<Vec<u8>, SoapError> {
    build_soap_envelope_with_body(fault.to_element())
}
