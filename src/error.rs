//! Error taxonomy shared by the stores and the directory controller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Every failure is recoverable; callers surface it and keep their state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// A required field was blank, or an optional one was out of range.
    #[error("validation failed: {field} {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    #[error("record {id} not found")]
    NotFound { id: String },

    /// Storage or network failure. The operation was abandoned.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A create/delete is still in flight.
    #[error("another change is still in progress")]
    Busy,
}

impl VaultError {
    pub fn missing(field: &'static str) -> Self {
        Self::Validation {
            field,
            reason: "is required",
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Whether re-triggering the same operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Busy)
    }
}
