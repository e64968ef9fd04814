//! Error types for project model parsing.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while reading or interpreting a project document.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to parse project: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid resolution format: {0}")]
    InvalidResolution(String),

    #[error("Invalid generation source: {0}")]
    InvalidSource(String),
}

impl ModelError {
    pub fn invalid_resolution(value: impl Into<String>) -> Self {
        Self::InvalidResolution(value.into())
    }

    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource(message.into())
    }
}
