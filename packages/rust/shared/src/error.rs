//! Error types for LineupRelay.
//!
//! Library crates use [`RelayError`] via `thiserror`.
//! The server app maps each variant onto an HTTP status and a JSON body.

use std::path::PathBuf;

/// Top-level error type for all LineupRelay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing credential, missing agent id, or an unreadable config file.
    #[error("config error: {message}")]
    Config { message: String },

    /// Client input error (missing field, malformed body, bad CSV header).
    #[error("validation error: {message}")]
    Validation {
        message: String,
        details: Option<String>,
    },

    /// The upstream platform has no such job.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Transport failure talking to the upstream platform.
    #[error("network error: {0}")]
    Network(String),

    /// The upstream platform answered with a non-2xx status.
    #[error("upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// The upstream platform answered with a body we could not decode.
    #[error("invalid upstream response: {message}")]
    InvalidUpstream { message: String, preview: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            details: None,
        }
    }

    /// Create a validation error carrying a second, more specific line.
    pub fn validation_with(msg: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            details: Some(details.into()),
        }
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short, client-facing message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Config { message }
            | Self::Validation { message, .. }
            | Self::NotFound { message }
            | Self::Upstream { message, .. }
            | Self::InvalidUpstream { message, .. } => message.clone(),
            Self::Network(msg) | Self::Internal(msg) => msg.clone(),
            Self::Io { path, source } => format!("{}: {source}", path.display()),
        }
    }
}
