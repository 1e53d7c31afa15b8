//! Error types shared by the session store, API client and transfer workflow.

use std::path::Path;

use thiserror::Error;

/// Maximum number of response body bytes kept in an [`DroppError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Every failure a dropp operation can surface to the user.
///
/// Errors are terminal for the single action that produced them. None of
/// them are retried automatically.
#[derive(Debug, Clone, Error)]
pub enum DroppError {
    /// Transport-level failure (no connectivity, DNS, TLS, timeout, body read).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", body_suffix(.body))]
    Http { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Parse(String),

    /// Client-side quota pre-check rejected an upload.
    #[error(
        "Upload would exceed storage capacity. Available: {}, Required: {}",
        human_bytes(.available),
        human_bytes(.required)
    )]
    CapacityExceeded { available: u64, required: u64 },

    /// Writing a downloaded file to local storage failed.
    #[error("Failed to save {path}: {reason}")]
    StorageWrite { path: String, reason: String },

    /// Reading a local file for upload failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFile { path: String, reason: String },

    /// An authenticated operation was attempted without a token.
    #[error("Not logged in")]
    MissingSession,

    /// The auth callback URL was not a valid `dropp://auth` link.
    #[error("Invalid auth link: {0}")]
    InvalidDeepLink(String),

    /// The persistent session backend failed.
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// A worker task ended without producing a result.
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl DroppError {
    /// Build an HTTP error, truncating the body to keep notifications short.
    pub fn http(status: u16, body: &str) -> Self {
        let mut body = body.trim().to_string();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        DroppError::Http { status, body }
    }

    pub fn storage_write(path: &Path, err: impl std::fmt::Display) -> Self {
        DroppError::StorageWrite {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn read_file(path: &Path, err: impl std::fmt::Display) -> Self {
        DroppError::ReadFile {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DroppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DroppError {
    fn from(err: reqwest::Error) -> Self {
        DroppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DroppError {
    fn from(err: serde_json::Error) -> Self {
        DroppError::Parse(err.to_string())
    }
}

#[cfg(feature = "keychain")]
impl From<keyring::Error> for DroppError {
    fn from(err: keyring::Error) -> Self {
        DroppError::SessionStore(err.to_string())
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {}", body)
    }
}

fn human_bytes(bytes: &u64) -> String {
    crate::format::format_bytes(*bytes)
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DroppError>;
