//! Registre des opérations : (path, action, élément du Body) → handler
//!
//! Le registre est construit en deux temps. Un [`RegistryBuilder`] mutable
//! reçoit les enregistrements pendant la configuration, puis
//! [`RegistryBuilder::build`] le fige en un [`Registry`] en lecture seule,
//! consulté sans verrou pendant le service.

use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use axum::http::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::sink::ResponseSink;
use crate::errors::{RoutingError, SoapError};
use crate::soap::{Decoded, build_envelope, parse_envelope_into};

/// Informations sur la requête HTTP, transmises aux handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    /// SOAPAction normalisée (sans guillemets)
    pub action: String,
    pub headers: HeaderMap,
}

/// Échec d'une étape d'une opération
#[derive(Debug)]
pub(crate) enum OperationError {
    Unmarshal(String),
    Handler(anyhow::Error),
    Marshal(SoapError),
}

/// Opération dont les types de requête et de réponse ont été effacés
pub(crate) trait Operation: Send + Sync {
    /// Décode la requête, appelle le handler et encode sa réponse.
    ///
    /// Retourne `None` si le handler a lui-même produit la sortie.
    fn invoke(
        &self,
        xml: &[u8],
        sink: &mut ResponseSink,
        context: &RequestContext,
    ) -> Result<Option<Vec<u8>>, OperationError>;
}

struct TypedOperation<Req, Resp, F, H> {
    factory: F,
    handler: H,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, F, H> Operation for TypedOperation<Req, Resp, F, H>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: Fn() -> Req + Send + Sync,
    H: Fn(Req, &mut ResponseSink, &RequestContext) -> anyhow::Result<Resp> + Send + Sync,
{
    fn invoke(
        &self,
        xml: &[u8],
        sink: &mut ResponseSink,
        context: &RequestContext,
    ) -> Result<Option<Vec<u8>>, OperationError> {
        let mut request = (self.factory)();
        match parse_envelope_into(xml, Some(&mut request)) {
            Ok(Decoded::Content { .. }) => {}
            Ok(Decoded::Fault(fault)) => {
                return Err(OperationError::Unmarshal(format!(
                    "request body is a SOAP Fault: {}",
                    fault
                )));
            }
            Err(e) => return Err(OperationError::Unmarshal(e.to_string())),
        }

        let response = (self.handler)(request, sink, context).map_err(OperationError::Handler)?;

        if sink.is_started() {
            debug!(path = %context.path, action = %context.action, "handler sent its own output");
            return Ok(None);
        }

        build_envelope(&response)
            .map(Some)
            .map_err(OperationError::Marshal)
    }
}

type ElementTable = HashMap<String, Arc<dyn Operation>>;
type ActionTable = HashMap<String, ElementTable>;

/// Phase de configuration du registre
#[derive(Default)]
pub struct RegistryBuilder {
    routes: HashMap<String, ActionTable>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un handler.
    ///
    /// `factory` fournit l'instance de requête remplie par le décodage ;
    /// un second enregistrement sur la même clé remplace le premier.
    pub fn register<Req, Resp, F, H>(
        &mut self,
        path: &str,
        action: &str,
        element: &str,
        factory: F,
        handler: H,
    ) where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        F: Fn() -> Req + Send + Sync + 'static,
        H: Fn(Req, &mut ResponseSink, &RequestContext) -> anyhow::Result<Resp>
            + Send
            + Sync
            + 'static,
    {
        let operation: Arc<dyn Operation> = Arc::new(TypedOperation {
            factory,
            handler,
            _types: PhantomData,
        });

        let previous = self
            .routes
            .entry(path.to_string())
            .or_default()
            .entry(action.to_string())
            .or_default()
            .insert(element.to_string(), operation);

        if previous.is_some() {
            warn!(path, action, element, "SOAP handler registration overwritten");
        } else {
            debug!(path, action, element, "SOAP handler registered");
        }
    }

    pub fn build(self) -> Registry {
        Registry {
            routes: self.routes,
        }
    }
}

/// Registre figé, partagé entre les requêtes
#[derive(Clone, Default)]
pub struct Registry {
    routes: HashMap<String, ActionTable>,
}

impl Registry {
    /// Résout la table des éléments pour (path, action).
    pub(crate) fn actions(&self, path: &str, action: &str) -> Result<&ElementTable, RoutingError> {
        self.routes
            .get(path)
            .ok_or_else(|| RoutingError::UnknownPath(path.to_string()))?
            .get(action)
            .ok_or_else(|| RoutingError::UnknownAction(action.to_string()))
    }

    pub(crate) fn operation<'a>(
        elements: &'a ElementTable,
        element: &str,
    ) -> Result<&'a Arc<dyn Operation>, RoutingError> {
        elements
            .get(element)
            .ok_or_else(|| RoutingError::NoHandler(element.to_string()))
    }

    pub fn contains(&self, path: &str, action: &str, element: &str) -> bool {
        self.actions(path, action)
            .map(|elements| elements.contains_key(element))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.routes
            .values()
            .flat_map(|actions| actions.values())
            .map(|elements| elements.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
