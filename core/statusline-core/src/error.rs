//! Error types for statusline-core operations.
//!
//! Nothing here is fatal to a render. Callers in [`crate::invocation`] turn
//! every variant into a degraded default and log it.

use std::path::PathBuf;

/// All errors that can occur in statusline-core operations.
#[derive(Debug, thiserror::Error)]
pub enum StatuslineError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Subprocess Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl StatuslineError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StatuslineError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using StatuslineError.
pub type Result<T> = std::result::Result<T, StatuslineError>;
