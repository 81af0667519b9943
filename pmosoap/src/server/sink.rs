//! Sortie HTTP partagée entre le routeur et les handlers
//!
//! Un handler peut prendre la main sur la réponse (statut, en-têtes, corps).
//! Dès qu'il a commencé, le routeur n'écrit plus rien : l'écriture d'une
//! enveloppe par le routeur après coup est une erreur représentable,
//! [`SinkError::OutputAlreadyStarted`].

use std::io;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};

use crate::errors::SinkError;

/// États de la sortie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    NotStarted,
    HeaderSent,
    BodyWritten,
}

#[derive(Debug)]
pub struct ResponseSink {
    state: SinkState,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink {
    pub fn new() -> Self {
        Self {
            state: SinkState::NotStarted,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Vrai dès que le statut a été envoyé ou qu'un octet a été écrit
    pub fn is_started(&self) -> bool {
        self.state != SinkState::NotStarted
    }

    /// Ajoute un en-tête ; impossible une fois le statut envoyé.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError> {
        if self.is_started() {
            return Err(SinkError::HeaderAlreadySent);
        }
        self.headers.insert(name, value);
        Ok(())
    }

    /// Envoie le statut : `NotStarted → HeaderSent`.
    pub fn write_header(&mut self, status: StatusCode) -> Result<(), SinkError> {
        if self.is_started() {
            return Err(SinkError::HeaderAlreadySent);
        }
        self.status = status;
        self.state = SinkState::HeaderSent;
        Ok(())
    }

    /// Écrit dans le corps ; un statut 200 est implicite si aucun n'a été
    /// envoyé.
    pub fn write_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
        self.state = SinkState::BodyWritten;
    }

    /// Écriture d'une enveloppe complète par le routeur.
    pub(crate) fn write_envelope(
        &mut self,
        status: StatusCode,
        content_type: &'static str,
        envelope: Vec<u8>,
    ) -> Result<(), SinkError> {
        if self.is_started() {
            return Err(SinkError::OutputAlreadyStarted);
        }
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(envelope.len()));
        self.status = status;
        self.body = envelope;
        self.state = SinkState::BodyWritten;
        Ok(())
    }

    pub(crate) fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
