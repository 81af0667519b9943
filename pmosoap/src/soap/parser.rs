//! Décodage des enveloppes SOAP
//!
//! Le Body est lu en flux : le premier élément rencontré décide du résultat
//! (fault ou contenu applicatif), un second élément est une erreur.

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::{Body, BodyContent, Envelope, Fault, Header, NAMESPACE_SOAP11};
use crate::errors::SoapError;

/// Résultat d'un décodage dans une destination fournie par l'appelant
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Le Body contenait un fault ; la destination n'a pas été touchée
    Fault(Fault),
    /// La destination a été remplie à partir de l'élément `element_name`
    Content { element_name: String },
}

/// Élément unique trouvé dans le Body, encore sous forme XML
struct BodyElement<'a> {
    name: String,
    is_fault: bool,
    xml: &'a str,
}

/// Résultat du parcours d'une enveloppe
struct Scan<'a> {
    header: Option<Header>,
    element: Option<BodyElement<'a>>,
}

fn is_soap_namespace(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == NAMESPACE_SOAP11.as_bytes())
}

fn slice(xml: &str, start: usize, end: usize) -> &str {
    &xml[start..end]
}

/// Lit l'évènement suivant et indique si son nom est dans le namespace SOAP.
fn next_event<'i>(reader: &mut NsReader<&'i [u8]>) -> Result<(bool, Event<'i>), SoapError> {
    let (ns, event) = reader.read_resolved_event()?;
    Ok((is_soap_namespace(&ns), event))
}

/// Parcourt l'enveloppe sans rien désérialiser.
fn scan(xml: &[u8]) -> Result<Scan<'_>, SoapError> {
    let text = std::str::from_utf8(xml)?;
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(true);

    // Racine : Envelope dans le namespace SOAP
    loop {
        match next_event(&mut reader)? {
            (soap, Event::Start(e)) => {
                if soap && e.local_name().as_ref() == b"Envelope" {
                    break;
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                return Err(SoapError::MissingEnvelope(name));
            }
            (_, Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                return Err(SoapError::MissingEnvelope(name));
            }
            (_, Event::Eof) => return Err(SoapError::MissingEnvelope(String::new())),
            _ => {}
        }
    }

    // Enfants de l'Envelope : Header optionnel puis Body
    let mut header = None;
    loop {
        match next_event(&mut reader)? {
            (soap, Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"Body" if soap => break,
                    b"Header" if soap => {
                        let span = reader.read_to_end(e.name())?;
                        let content = slice(text, span.start as usize, span.end as usize);
                        header = Some(Header {
                            content: content.trim().to_string(),
                        });
                    }
                    _ => {
                        reader.read_to_end(e.name())?;
                    }
                }
            }
            (soap, Event::Empty(e)) => {
                match e.local_name().as_ref() {
                    b"Body" if soap => {
                        return Ok(Scan {
                            header,
                            element: None,
                        });
                    }
                    b"Header" if soap => header = Some(Header::default()),
                    _ => {}
                }
            }
            (_, Event::End(_)) | (_, Event::Eof) => return Err(SoapError::MissingBody),
            _ => {}
        }
    }

    // Body : au plus un élément
    let mut element: Option<BodyElement<'_>> = None;
    loop {
        let before = reader.buffer_position() as usize;
        match next_event(&mut reader)? {
            (soap, Event::Start(e)) => {
                if element.is_some() {
                    return Err(SoapError::MultipleBodyElements);
                }
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let is_fault = soap && name == "Fault";
                reader.read_to_end(e.name())?;
                let after = reader.buffer_position() as usize;
                element = Some(BodyElement {
                    name,
                    is_fault,
                    xml: slice(text, before, after).trim(),
                });
            }
            (soap, Event::Empty(e)) => {
                if element.is_some() {
                    return Err(SoapError::MultipleBodyElements);
                }
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let is_fault = soap && name == "Fault";
                let after = reader.buffer_position() as usize;
                element = Some(BodyElement {
                    name,
                    is_fault,
                    xml: slice(text, before, after).trim(),
                });
            }
            (_, Event::End(_)) => break,
            (_, Event::Eof) => return Err(SoapError::MissingBody),
            _ => {}
        }
    }

    Ok(Scan { header, element })
}

/// Décode une enveloppe en désérialisant le contenu du Body dans `T`.
///
/// Un Body contenant un fault donne [`BodyContent::Fault`] ; `T` n'est alors
/// pas construit.
pub fn parse_envelope<T: DeserializeOwned>(xml: &[u8]) -> Result<Envelope<T>, SoapError> {
    let scan = scan(xml)?;
    let element = scan.element.ok_or(SoapError::EmptyBody)?;

    let content = if element.is_fault {
        BodyContent::Fault(Fault::parse(element.xml)?)
    } else {
        BodyContent::Content(quick_xml::de::from_str(element.xml)?)
    };

    Ok(Envelope {
        header: scan.header,
        body: Body {
            element_name: element.name,
            content,
        },
    })
}

/// Décode une enveloppe dans la destination fournie par l'appelant.
///
/// Sans destination, le contenu est lu puis jeté : seul un fault éventuel
/// est remonté.
pub fn parse_envelope_into<T: DeserializeOwned>(
    xml: &[u8],
    destination: Option<&mut T>,
) -> Result<Decoded, SoapError> {
    let element = scan(xml)?.element.ok_or(SoapError::EmptyBody)?;

    if element.is_fault {
        let fault = Fault::parse(element.xml)?;
        debug!(code = %fault.code, string = %fault.string, "SOAP Fault found in body");
        return Ok(Decoded::Fault(fault));
    }

    if let Some(destination) = destination {
        *destination = quick_xml::de::from_str(element.xml)?;
    }
    trace!(element = %element.name, "SOAP body decoded");

    Ok(Decoded::Content {
        element_name: element.name,
    })
}

/// Sonde le nom local de l'élément du Body, sans connaître son type.
///
/// Un Body vide donne une chaîne vide, un fault donne `"Fault"`.
pub fn probe_body_element(xml: &[u8]) -> Result<String, SoapError> {
    Ok(scan(xml)?.element.map(|e| e.name).unwrap_or_default())
}
