//! Transport error types

use thiserror::Error;

/// Transport failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Response body of a non-success reply, when one could be read
    pub body: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "Request cancelled")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn server_error(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(
            TransportErrorKind::ServerError { status },
            format!("HTTP error! status: {status} - {body}"),
        )
        .with_body(body)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidResponse, message)
    }

    /// HTTP status of a server error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            TransportErrorKind::ServerError { status } => Some(status),
            _ => None,
        }
    }
}

/// Error classification used to pick the user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Cancelled through the request's token before it completed
    Cancelled,
    /// The transport's own deadline expired
    Timeout,
    /// The backend answered with a non-success status
    ServerError { status: u16 },
    /// Connection failures and other transport-level problems
    Network,
    /// A success status with a body we could not decode
    InvalidResponse,
}
