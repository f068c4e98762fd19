//! Error types for subharvest.
//!
//! Library crates use [`SubharvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all subharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum SubharvestError {
    /// Configuration loading or validation error (missing credentials,
    /// malformed config file). Always raised before any side effect.
    #[error("config error: {message}")]
    Config { message: String },

    /// The source rejected our credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The source is throttling us.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The requested feed does not exist at the source.
    #[error("feed not found: {feed}")]
    NotFound { feed: String },

    /// Network or availability error while talking to the source.
    #[error("source error: {0}")]
    Source(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record with this id is already stored. The unique-key backstop
    /// for two runs racing on the same existence-check snapshot.
    #[error("duplicate record id: {id}")]
    Duplicate { id: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SubharvestError>;

impl SubharvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a source error from any displayable message.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a storage error from any displayable message.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SubharvestError::config("missing REDDIT_CLIENT_SECRET");
        assert_eq!(err.to_string(), "config error: missing REDDIT_CLIENT_SECRET");

        let err = SubharvestError::Duplicate { id: "1abc2d".into() };
        assert_eq!(err.to_string(), "duplicate record id: 1abc2d");

        let err = SubharvestError::NotFound {
            feed: "no_such_sub".into(),
        };
        assert!(err.to_string().contains("no_such_sub"));
    }
}
