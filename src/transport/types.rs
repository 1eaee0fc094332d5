//! Request and response types for the assistant backend

use crate::upload::UploadFile;
use serde::{Deserialize, Serialize};

/// A single request to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `POST /api/ask`
    Text { prompt: String },
    /// `POST /api/upload` (multipart)
    File {
        file: UploadFile,
        prompt: Option<String>,
    },
}

impl Request {
    pub fn text(prompt: impl Into<String>) -> Self {
        Request::Text {
            prompt: prompt.into(),
        }
    }

    pub fn file(file: UploadFile, prompt: Option<String>) -> Self {
        Request::File { file, prompt }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Text { .. } => RequestKind::Text,
            Request::File { .. } => RequestKind::File,
        }
    }
}

/// Which flavor of turn a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Text,
    File,
}

/// JSON body for `/api/ask`
#[derive(Debug, Serialize)]
pub(crate) struct AskBody<'a> {
    pub prompt: &'a str,
}

/// Successful reply from either endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Response {
    pub response: String,
}

impl Response {
    #[allow(dead_code)] // Test and mock convenience
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}
