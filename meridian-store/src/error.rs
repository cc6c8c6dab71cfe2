//! Error types for the feature store.
//!
//! Every public operation yields exactly one of: success, [`Error::Validation`],
//! [`Error::ConcurrencyConflict`], or a backing-store error surfaced verbatim.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Feature store errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input is structurally invalid. Never leaves partial state.
    #[error("{0}")]
    Validation(String),

    /// A conditional guard on a write did not hold: concurrent
    /// modification, a stale version token, or a missing target. The
    /// caller decides whether to refetch and retry.
    #[error("Conditional check failed")]
    ConcurrencyConflict,

    /// Any other backing-store failure, surfaced verbatim and never
    /// retried internally; the idempotency rules make caller retries safe.
    #[error("Storage error: {0}")]
    Storage(meridian_core::Error),

    /// Feature payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// The validation error for a feature lacking a client-supplied id.
    pub fn missing_id() -> Self {
        Error::Validation("Feature does not specify an id".to_string())
    }

    /// True when this is a concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict)
    }

    /// True when this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<meridian_core::Error> for Error {
    fn from(err: meridian_core::Error) -> Self {
        match err {
            meridian_core::Error::ConditionalCheckFailed => Error::ConcurrencyConflict,
            other => Error::Storage(other),
        }
    }
}
