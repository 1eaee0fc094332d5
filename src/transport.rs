//! Transport client abstraction
//!
//! One request, one attempt. Implementations must not touch session state;
//! retrying (there is none) and error presentation belong to the caller.

mod error;
mod http;
mod types;

pub use error::{TransportError, TransportErrorKind};
pub use http::{HttpTransport, TransportConfig};
pub use types::{Request, RequestKind, Response};

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Common interface for reaching the assistant backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request.
    ///
    /// Resolves to `TransportErrorKind::Cancelled` once `cancel` fires,
    /// abandoning the underlying call.
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError>;

    /// Where requests go, for logging
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        (**self).send(request, cancel).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
    endpoint: String,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        let endpoint = inner.endpoint().to_string();
        Self { inner, endpoint }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(request, cancel).await;
        let duration = start.elapsed();
        let kind = request.kind();

        match &result {
            Ok(response) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    ?kind,
                    duration_ms = %duration.as_millis(),
                    response_chars = response.response.chars().count(),
                    "Backend request completed"
                );
            }
            Err(e) if e.kind == TransportErrorKind::Cancelled => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    ?kind,
                    duration_ms = %duration.as_millis(),
                    "Backend request cancelled"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.endpoint,
                    ?kind,
                    duration_ms = %duration.as_millis(),
                    status = ?e.status(),
                    body_len = e.body.as_ref().map_or(0, String::len),
                    error = %e.message,
                    "Backend request failed"
                );
            }
        }

        result
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
