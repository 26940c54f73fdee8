//! Error types for muninn.
//!
//! Library crates use [`MuninnError`] via `thiserror`.
//! The worker binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all muninn operations.
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP error talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// An external provider (search, scraper) answered with something unusable.
    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// Text-generation call failed or returned an unusable response.
    #[error("generation error: {0}")]
    Generation(String),

    /// Broker connection, channel, or delivery error.
    #[error("broker error: {0}")]
    Broker(String),

    /// Inbound payload could not be decoded into an errand.
    #[error("decode error: {0}")]
    Decode(String),

    /// Errand carried instructions this worker does not handle.
    #[error("unsupported instructions on errand {errand_identifier}")]
    UnsupportedInstructions { errand_identifier: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MuninnError>;

impl MuninnError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a provider error tagged with the provider name.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// Whether this error means the broker connection is gone and must be rebuilt.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Broker(_))
    }
}
