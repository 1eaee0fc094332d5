//! HTTP transport for the assistant backend

use super::types::{AskBody, Request, Response};
use super::{Transport, TransportError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Connection settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    /// Whole-request deadline; expiry surfaces as a timeout error
    pub timeout: Duration,
}

/// Backend client speaking `/api/ask` (JSON) and `/api/upload` (multipart)
pub struct HttpTransport {
    client: Client,
    base_url: String,
    ask_url: String,
    upload_url: String,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            ask_url: format!("{base_url}/api/ask"),
            upload_url: format!("{base_url}/api/upload"),
            base_url,
        })
    }

    fn build_request(&self, request: &Request) -> Result<reqwest::RequestBuilder, TransportError> {
        match request {
            Request::Text { prompt } => {
                Ok(self.client.post(&self.ask_url).json(&AskBody { prompt }))
            }
            Request::File { file, prompt } => {
                tracing::debug!(file = %file.name(), size = file.size(), "Building upload");
                let mime = mime_guess::from_path(file.name()).first_or_octet_stream();
                let part = Part::bytes(file.bytes().to_vec())
                    .file_name(file.name().to_string())
                    .mime_str(mime.essence_str())
                    .map_err(|e| TransportError::network(format!("Invalid upload part: {e}")))?;
                let form = Form::new()
                    .part("file", part)
                    .text("user_prompt", prompt.clone().unwrap_or_default());
                Ok(self.client.post(&self.upload_url).multipart(form))
            }
        }
    }

    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            // Diagnostic only; an unreadable body must not mask the status
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::server_error(status.as_u16(), body));
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        serde_json::from_str::<Response>(&body).map_err(|e| {
            TransportError::invalid_response(format!(
                "Failed to parse response: {e} - body: {body}"
            ))
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        TransportError::network(format!("Connection failed: {e}"))
    } else {
        TransportError::network(format!("Request failed: {e}"))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(TransportError::cancelled()),

            result = self.execute(request) => result,
        }
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
