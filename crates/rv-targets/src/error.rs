//! Error types for target specification handling.

use std::path::PathBuf;

/// Errors that can occur while loading or writing target specifications.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading/writing spec files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Spec file not found.
    #[error("target spec not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
