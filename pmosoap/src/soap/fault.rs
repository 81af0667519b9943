//! SOAP Faults

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::warn;
use xmltree::{Element, XMLNode};

use super::fault_codes;
use crate::errors::SoapError;

/// Erreur SOAP (Fault)
///
/// Les faults SOAP 1.2 (`Code/Value`, `Reason/Text`, `Role`, `Detail`) sont
/// ramenés aux mêmes champs que les faults SOAP 1.1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fault {
    /// Code d'erreur (ex: "Client", "soap:Server")
    pub code: String,

    /// Description de l'erreur
    pub string: String,

    /// Acteur à l'origine du fault
    pub actor: String,

    /// Contenu XML brut de l'élément detail
    pub detail: String,
}

impl Fault {
    /// Crée un fault SOAP simple
    pub fn new(code: impl Into<String>, string: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            string: string.into(),
            ..Default::default()
        }
    }

    pub fn client(string: impl Into<String>) -> Self {
        Self::new(fault_codes::CLIENT, string)
    }

    pub fn server(string: impl Into<String>) -> Self {
        Self::new(fault_codes::SERVER, string)
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// `detail` est du XML brut, inséré tel quel dans l'élément detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Décode un élément Fault complet (balise ouvrante incluse).
    pub(crate) fn parse(xml: &str) -> Result<Self, SoapError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut fault = Fault::default();

        // Se placer sur la balise Fault elle-même
        loop {
            match reader.read_event()? {
                Event::Start(_) => break,
                Event::Empty(_) | Event::Eof => return Ok(fault),
                _ => {}
            }
        }

        // Conteneur SOAP 1.2 en cours (Code ou Reason)
        let mut container: Option<Vec<u8>> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let local = e.local_name().as_ref().to_vec();
                    if container.is_none() && matches!(local.as_slice(), b"Code" | b"Reason") {
                        container = Some(local);
                        continue;
                    }
                    let span = reader.read_to_end(e.name())?;
                    let raw = &xml[span.start as usize..span.end as usize];

                    match (container.as_deref(), local.as_slice()) {
                        (None, b"faultcode") => fault.code = leaf_text(raw)?,
                        (None, b"faultstring") => fault.string = leaf_text(raw)?,
                        (None, b"faultactor" | b"Role") => fault.actor = leaf_text(raw)?,
                        (None, b"detail" | b"Detail") => fault.detail = raw.trim().to_string(),
                        (Some(b"Code"), b"Value") if fault.code.is_empty() => {
                            fault.code = leaf_text(raw)?
                        }
                        (Some(b"Reason"), b"Text") if fault.string.is_empty() => {
                            fault.string = leaf_text(raw)?
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    if container.take().is_none() {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(fault)
    }

    /// Met en forme le fault pour un message d'erreur : un élément par ligne,
    /// indenté, sans préfixes ni déclarations de namespace, sans la balise
    /// Fault englobante.
    pub fn render(&self) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        if let Err(e) = self.write_rendered(&mut writer) {
            warn!("incomplete fault rendering: {}", e);
        }
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    fn write_rendered(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), SoapError> {
        let fields = [
            ("faultcode", &self.code),
            ("faultstring", &self.string),
            ("faultactor", &self.actor),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                continue;
            }
            writer
                .create_element(name)
                .write_text_content(BytesText::new(value))?;
        }

        if !self.detail.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("detail")))?;
            // détail non XML : recopié tel quel
            if copy_stripped(&self.detail, &mut Writer::new(Vec::new())).is_ok() {
                copy_stripped(&self.detail, writer)?;
            } else {
                writer.write_event(Event::Text(BytesText::new(&self.detail)))?;
            }
            writer.write_event(Event::End(BytesEnd::new("detail")))?;
        }
        Ok(())
    }

    /// Élément Fault prêt à être placé dans un Body.
    pub(crate) fn to_element(&self) -> Element {
        let mut fault = Element::new("Fault");

        for (name, value) in [
            ("faultcode", &self.code),
            ("faultstring", &self.string),
            ("faultactor", &self.actor),
        ] {
            if value.is_empty() {
                continue;
            }
            let mut child = Element::new(name);
            child.children.push(XMLNode::Text(value.clone()));
            fault.children.push(XMLNode::Element(child));
        }

        if !self.detail.is_empty() {
            let wrapped = format!("<detail>{}</detail>", self.detail);
            let detail = Element::parse(wrapped.as_bytes()).unwrap_or_else(|_| {
                let mut detail = Element::new("detail");
                detail.children.push(XMLNode::Text(self.detail.clone()));
                detail
            });
            fault.children.push(XMLNode::Element(detail));
        }

        fault
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.string)
    }
}

impl std::error::Error for Fault {}

fn leaf_text(raw: &str) -> Result<String, SoapError> {
    Ok(unescape(raw.trim())?.into_owned())
}

/// Recopie un fragment XML en ne gardant que les noms locaux.
fn copy_stripped(fragment: &str, writer: &mut Writer<Vec<u8>>) -> Result<(), SoapError> {
    let mut reader = Reader::from_str(fragment);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(e) => writer.write_event(Event::Start(strip_start(&e)?))?,
            Event::Empty(e) => writer.write_event(Event::Empty(strip_start(&e)?))?,
            Event::End(e) => {
                let local = std::str::from_utf8(e.local_name().into_inner())?.to_string();
                writer.write_event(Event::End(BytesEnd::new(local)))?
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
            other => writer.write_event(other)?,
        }
    }
    Ok(())
}

fn strip_start(e: &BytesStart<'_>) -> Result<BytesStart<'static>, SoapError> {
    let local = std::str::from_utf8(e.local_name().into_inner())?.to_string();
    let mut stripped = BytesStart::new(local);
    for attr in e.attributes().flatten() {
        let key = attr.key;
        if key.as_namespace_binding().is_some() {
            continue;
        }
        stripped.push_attribute((key.local_name().into_inner(), attr.value.as_ref()));
    }
    Ok(stripped)
}
