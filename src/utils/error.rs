//! Error Handling
//!
//! Unified error types for the uilens runtime.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use uilens_core::CoreError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The connection to the analysis service is not open
    #[error("Connection to the analysis service is unavailable")]
    ConnectionUnavailable,

    /// No response arrived for a correlated request in time
    #[error("Request '{request}' timed out after {timeout_secs}s")]
    RequestTimeout { request: String, timeout_secs: u64 },

    /// The service explicitly refused a request
    #[error("Rejected by analysis service: {0}")]
    ServerRejected(String),

    /// A response arrived for a request that is no longer pending
    #[error("Stale response: {0}")]
    StaleResponse(String),

    /// The waiter for a request was dropped before resolution
    #[error("Response channel closed: {0}")]
    ChannelClosed(String),

    /// The service reported an analysis failure
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// WebSocket transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a timeout error
    pub fn timeout(request: impl Into<String>, timeout_secs: u64) -> Self {
        Self::RequestTimeout {
            request: request.into(),
            timeout_secs,
        }
    }

    /// Create a server rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ServerRejected(msg.into())
    }

    /// Create a stale response error
    pub fn stale(msg: impl Into<String>) -> Self {
        Self::StaleResponse(msg.into())
    }

    /// Create a websocket error
    pub fn websocket(msg: impl Into<String>) -> Self {
        Self::WebSocket(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this failure is confined to a single file's scan.
    ///
    /// Soft failures mark the file `Error` and the scan moves on.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            AppError::ConnectionUnavailable
                | AppError::RequestTimeout { .. }
                | AppError::ChannelClosed(_)
                | AppError::WebSocket(_)
        )
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
