//! User-facing wording for turn notices and failures

use crate::transport::{RequestKind, TransportErrorKind};

pub const CANCELLED_BY_USER: &str = "Response cancelled by user.";
pub const ANALYZING_FILE: &str = "Analyzing your file...";

const UNAVAILABLE: &str = "The server is temporarily unavailable. Please try again in a few minutes.";

/// Map a transport failure to the message shown in its place.
///
/// Total over every kind and status; anything unrecognised gets the
/// generic apology for its request kind.
pub fn failure_notice(kind: TransportErrorKind, request: RequestKind) -> &'static str {
    match (kind, request) {
        (TransportErrorKind::Cancelled, _) => CANCELLED_BY_USER,

        (TransportErrorKind::Timeout, RequestKind::Text) => {
            "Request timed out. The server may be experiencing high load. Please try again in a moment."
        }
        (TransportErrorKind::Timeout, RequestKind::File) => {
            "File upload timed out. Please try with a smaller file or try again later."
        }

        (TransportErrorKind::ServerError { status: 500 }, RequestKind::Text) => {
            "The server is experiencing internal issues. Please try again in a few minutes."
        }
        (TransportErrorKind::ServerError { status: 500 }, RequestKind::File) => {
            "The server is experiencing internal issues. Please try uploading your file again in a few minutes."
        }
        (TransportErrorKind::ServerError { status: 502 | 503 }, _) => UNAVAILABLE,

        (
            TransportErrorKind::ServerError { .. }
            | TransportErrorKind::Network
            | TransportErrorKind::InvalidResponse,
            RequestKind::Text,
        ) => "Sorry, I encountered an error while processing your request. Please try again.",
        (
            TransportErrorKind::ServerError { .. }
            | TransportErrorKind::Network
            | TransportErrorKind::InvalidResponse,
            RequestKind::File,
        ) => "Sorry, I encountered an error while analyzing your file. Please try again.",
    }
}

/// System message that introduces a file turn
pub fn upload_notice(name: &str, prompt: Option<&str>) -> String {
    match prompt {
        Some(prompt) => format!("Uploaded file: {name} with prompt: \"{prompt}\""),
        None => format!("Uploaded file: {name}"),
    }
}
