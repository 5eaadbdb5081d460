//! Error types for the SDK.
//!
//! Every public operation returns [`Result`]. Validation problems are
//! reported before any network or filesystem activity takes place.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the SDK error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any I/O (missing credentials, unknown format, bad config)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sign-in failed or returned an unusable response
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-2xx response or connection failure on an individual request
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Session file error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

impl Error {
    /// Truncate a response body to avoid carrying excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        let reason = status.canonical_reason().unwrap_or("Unexpected status");
        Error::Transport {
            status: Some(status.as_u16()),
            message: if truncated.is_empty() {
                reason.to_string()
            } else {
                format!("{}: {}", reason, truncated)
            },
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
