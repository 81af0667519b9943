//! Traduction des namespaces d'enveloppe SOAP 1.1 ⇄ SOAP 1.2
//!
//! La substitution travaille sur les octets bruts, sans comprendre le XML :
//! une URI de namespace SOAP qui apparaîtrait telle quelle dans le texte du
//! payload serait elle aussi réécrite.

use super::{NAMESPACE_SOAP11, NAMESPACE_SOAP12};

/// Remplace toutes les occurrences de `from` par `to`.
pub fn translate(xml: &[u8], from: &str, to: &str) -> Vec<u8> {
    let from = from.as_bytes();
    let to = to.as_bytes();
    if from.is_empty() {
        return xml.to_vec();
    }

    let mut out = Vec::with_capacity(xml.len());
    let mut i = 0;
    while i < xml.len() {
        if xml[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(xml[i]);
            i += 1;
        }
    }
    out
}

/// Réécrit une enveloppe interne (1.1) pour le dialecte SOAP 1.2.
pub fn to_soap12(xml: &[u8]) -> Vec<u8> {
    translate(xml, NAMESPACE_SOAP11, NAMESPACE_SOAP12)
}

/// Ramène n'importe quel dialecte vers la forme interne SOAP 1.1.
pub fn normalize(xml: &[u8]) -> Vec<u8> {
    translate(xml, NAMESPACE_SOAP12, NAMESPACE_SOAP11)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE_11: &str = r#"<Envelope xmlns="http://schemas.xmlsoap.org/soap/envelope/">
  <Header />
  <Body>
    <fooRequest>
      <Foo>hello world</Foo>
    </fooRequest>
  </Body>
</Envelope>"#;

    #[test]
    fn test_translation_is_reversible() {
        let original = ENVELOPE_11.as_bytes();
        let v12 = to_soap12(original);
        assert_ne!(v12, original);
        assert!(String::from_utf8_lossy(&v12).contains(NAMESPACE_SOAP12));
        assert_eq!(normalize(&v12), original);
    }

    #[test]
    fn test_normalize_leaves_soap11_untouched() {
        assert_eq!(normalize(ENVELOPE_11.as_bytes()), ENVELOPE_11.as_bytes());
    }

    #[test]
    fn test_translate_all_occurrences() {
        let xml = format!(
            "<a:Envelope xmlns:a=\"{0}\"><b:Body xmlns:b=\"{0}\"/></a:Envelope>",
            NAMESPACE_SOAP12
        );
        let normalized = String::from_utf8(normalize(xml.as_bytes())).unwrap();
        assert_eq!(normalized.matches(NAMESPACE_SOAP11).count(), 2);
        assert!(!normalized.contains(NAMESPACE_SOAP12));
    }

    #[test]
    fn test_translate_non_utf8() {
        let mut xml = vec![0xff, 0xfe];
        xml.extend_from_slice(NAMESPACE_SOAP11.as_bytes());
        let out = to_soap12(&xml);
        assert_eq!(&out[..2], &[0xff, 0xfe]);
        assert_eq!(&out[2..], NAMESPACE_SOAP12.as_bytes());
    }
}
