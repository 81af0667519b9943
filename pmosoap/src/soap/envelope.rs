//! Structures de l'enveloppe SOAP

use serde::de::{Deserialize, Deserializer, IgnoredAny};

use super::Fault;

/// Enveloppe SOAP décodée
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    /// En-tête SOAP optionnel
    pub header: Option<Header>,

    /// Corps SOAP contenant le contenu applicatif ou un fault
    pub body: Body<T>,
}

/// En-tête SOAP, transmis tel quel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Contenu XML brut de l'en-tête (entre les balises Header)
    pub content: String,
}

/// Corps SOAP
#[derive(Debug, Clone, PartialEq)]
pub struct Body<T> {
    /// Nom local de l'unique élément trouvé dans le Body
    pub element_name: String,

    pub content: BodyContent<T>,
}

/// Contenu du Body : soit un fault, soit le contenu applicatif
#[derive(Debug, Clone, PartialEq)]
pub enum BodyContent<T> {
    Fault(Fault),
    Content(T),
}

impl<T> Body<T> {
    pub fn fault(&self) -> Option<&Fault> {
        match &self.content {
            BodyContent::Fault(fault) => Some(fault),
            BodyContent::Content(_) => None,
        }
    }

    pub fn content(&self) -> Option<&T> {
        match &self.content {
            BodyContent::Fault(_) => None,
            BodyContent::Content(content) => Some(content),
        }
    }

    pub fn into_content(self) -> Result<T, Fault> {
        match self.content {
            BodyContent::Fault(fault) => Err(fault),
            BodyContent::Content(content) => Ok(content),
        }
    }
}

/// Destination vide : le contenu est lu puis jeté.
///
/// Sert quand l'appelant n'attend qu'un code de statut, tout en restant
/// capable de détecter un fault à cette place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discard;

impl<'de> Deserialize<'de> for Discard {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Discard)
    }
}
