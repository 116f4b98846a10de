//! Core Error Types
//!
//! Errors raised by the synchronous, I/O-free part of uilens: location
//! parsing, wire (de)serialization and cache validation. The runtime crate
//! wraps these in its own `AppError`.

use thiserror::Error;

/// Core error type for the uilens workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A `file:line[:column]` string could not be parsed
    #[error("Invalid source location: {0}")]
    InvalidLocation(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create an invalid location error
    pub fn invalid_location(raw: impl Into<String>) -> Self {
        Self::InvalidLocation(raw.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
