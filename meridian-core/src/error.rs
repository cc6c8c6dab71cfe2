//! Error types for meridian-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by all backing-store implementations
#[derive(Error, Debug)]
pub enum Error {
    /// A conditional write was rejected because its guard did not hold.
    ///
    /// This is its own kind so callers can distinguish an expected
    /// concurrency outcome from a real storage failure.
    #[error("Conditional check failed")]
    ConditionalCheckFailed,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON parsing error (serde_json)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller supplied a malformed item or key
    #[error("Invalid item: {0}")]
    InvalidItem(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an I/O error
    pub fn io(msg: impl Into<String>) -> Self {
        Error::Io(msg.into())
    }

    /// Create an invalid item error
    pub fn invalid_item(msg: impl Into<String>) -> Self {
        Error::InvalidItem(msg.into())
    }

    /// True when this error is a rejected conditional write
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Error::ConditionalCheckFailed)
    }
}
