//! Extraction de la partie SOAP d'une réponse `multipart/*`
//!
//! Seule la localisation de l'enveloppe est prise en charge ; les autres
//! parties (pièces jointes) sont lues puis ignorées.

use tracing::{debug, trace};

use crate::errors::SoapError;

/// Type de média d'un en-tête `Content-Type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// `type/subtype` en minuscules
    pub essence: String,

    /// Paramètres, noms en minuscules, valeurs sans guillemets
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// Analyse la valeur d'un en-tête `Content-Type`.
    ///
    /// Retourne `None` si la valeur n'a pas la forme `type/subtype`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut items = split_params(value).into_iter();
        let essence = items.next()?.trim().to_ascii_lowercase();
        let (kind, subtype) = essence.split_once('/')?;
        if kind.is_empty() || subtype.is_empty() {
            return None;
        }

        let params = items
            .filter_map(|item| {
                let (name, value) = item.split_once('=')?;
                Some((name.trim().to_ascii_lowercase(), unquote(value.trim())))
            })
            .collect();

        Some(Self { essence, params })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }
}

/// Découpe sur `;` en respectant les valeurs entre guillemets.
fn split_params(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if quoted => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            ';' if !quoted => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Position de début de la ligne suivante.
fn next_line(body: &[u8], from: usize) -> Option<usize> {
    find(body, b"\n", from).map(|i| i + 1)
}

/// Le contenu d'une partie commence-t-il par une balise d'enveloppe SOAP ?
pub fn is_soap_part(content: &[u8]) -> bool {
    content.starts_with(b"<soap") || content.starts_with(b"<SOAP")
}

/// Retourne le contenu de la première partie qui commence par `<soap` ou
/// `<SOAP`.
///
/// # Errors
///
/// - [`SoapError::NoSoapPart`] si aucune partie ne correspond
/// - [`SoapError::Multipart`] si le corps est tronqué ou mal formé
pub fn extract_soap_part<'a>(body: &'a [u8], boundary: &str) -> Result<&'a [u8], SoapError> {
    let delimiter = format!("--{}", boundary).into_bytes();

    let Some(mut pos) = find(body, &delimiter, 0) else {
        debug!(boundary, "multipart body contains no boundary delimiter");
        return Err(SoapError::NoSoapPart);
    };

    let mut index = 0;
    loop {
        let after_delimiter = pos + delimiter.len();
        if body[after_delimiter..].starts_with(b"--") {
            break;
        }

        // Fin de la ligne du délimiteur, puis en-têtes de la partie
        let mut cursor = next_line(body, after_delimiter)
            .ok_or_else(|| SoapError::Multipart("truncated part delimiter".to_string()))?;
        let content_start = loop {
            let line_end = next_line(body, cursor)
                .ok_or_else(|| SoapError::Multipart("truncated part headers".to_string()))?;
            let line = &body[cursor..line_end];
            if line == b"\n" || line == b"\r\n" {
                break line_end;
            }
            cursor = line_end;
        };

        // Le délimiteur suivant doit être en début de ligne
        let mut search = content_start;
        let next = loop {
            let candidate = find(body, &delimiter, search)
                .ok_or_else(|| SoapError::Multipart("missing closing boundary".to_string()))?;
            if candidate > 0 && body[candidate - 1] == b'\n' {
                break candidate;
            }
            search = candidate + 1;
        };

        let mut content_end = next - 1;
        if content_end > content_start && body[content_end - 1] == b'\r' {
            content_end -= 1;
        }
        let content = &body[content_start..content_end.max(content_start)];

        trace!(part = index, len = content.len(), "multipart part read");
        if is_soap_part(content) {
            debug!(part = index, "found SOAP part in multipart message");
            return Ok(content);
        }

        index += 1;
        pos = next;
    }

    Err(SoapError::NoSoapPart)
}
