//! Validated source-file uploads
//!
//! The session core trusts whatever `UploadFile` it is handed, so the only
//! way to build one is through the checks here: a `.py` or `.cpp` name and
//! at most 5 MiB of content.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Largest accepted upload (5 MiB)
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please upload only .py or .cpp files.")]
    UnsupportedType { name: String },
    #[error("File size must be less than 5MB.")]
    TooLarge { name: String, size: usize },
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Language of an uploaded source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    SourcePython,
    SourceCpp,
}

impl FileKind {
    /// Detect the kind from a file name (extension match is case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".py") {
            Some(Self::SourcePython)
        } else if lower.ends_with(".cpp") {
            Some(Self::SourceCpp)
        } else {
            None
        }
    }

    /// Short label shown next to an attachment
    pub fn label(self) -> &'static str {
        match self {
            Self::SourcePython => "PYTHON",
            Self::SourceCpp => "C++",
        }
    }
}

/// A file that passed type and size validation
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    name: String,
    kind: FileKind,
    bytes: Arc<[u8]>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, UploadError> {
        let name = name.into();
        let Some(kind) = FileKind::from_name(&name) else {
            return Err(UploadError::UnsupportedType { name });
        };
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                name,
            });
        }
        Ok(Self {
            name,
            kind,
            bytes: bytes.into(),
        })
    }

    /// Read and validate a file from disk.
    ///
    /// The extension is checked before the file is read so that an
    /// unsupported file is never loaded.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if FileKind::from_name(&name).is_none() {
            return Err(UploadError::UnsupportedType { name });
        }

        let io_err = |source| UploadError::Io {
            path: path.display().to_string(),
            source,
        };
        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        if usize::try_from(metadata.len()).map_or(true, |len| len > MAX_UPLOAD_BYTES) {
            return Err(UploadError::TooLarge {
                name,
                size: usize::try_from(metadata.len()).unwrap_or(usize::MAX),
            });
        }
        let bytes = tokio::fs::read(path).await.map_err(io_err)?;
        Self::new(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &self.bytes.len())
            .finish()
    }
}
