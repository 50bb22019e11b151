//! Error types for SkyDAG.
//!
//! Library crates use [`SkyDagError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SkyDAG operations.
#[derive(Debug, thiserror::Error)]
pub enum SkyDagError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Patch-catalog parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Ephemeris epoch resolution error.
    #[error("ephemeris error: {0}")]
    Ephemeris(String),

    /// Workflow graph construction or serialization error.
    #[error("graph error: {0}")]
    Graph(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (short catalog under strict policy, bad geometry, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SkyDagError>;

impl SkyDagError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SkyDagError::config("unknown instrument: X9");
        assert_eq!(err.to_string(), "config error: unknown instrument: X9");

        let err = SkyDagError::validation("catalog exhausted at line 3");
        assert!(err.to_string().contains("catalog exhausted"));
    }

    #[test]
    fn ephemeris_error_display() {
        let err = SkyDagError::Ephemeris("no coverage for GPS 0-86400".into());
        assert_eq!(err.to_string(), "ephemeris error: no coverage for GPS 0-86400");
    }
}
