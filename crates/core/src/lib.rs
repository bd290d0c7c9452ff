//! Shared primitives for all Rust crates in keygate.

#![forbid(unsafe_code)]

/// Time source abstraction used for expiry evaluation.
pub mod clock;
/// Typed identifiers for permission owners and catalog entries.
pub mod ids;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ids::{PermissionId, RoleId, UserId};

/// Result type used across keygate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// One item of a bulk write that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemFailure {
    /// Permission the failed item targeted.
    pub permission_id: PermissionId,
    /// Store-provided failure description.
    pub message: String,
}

/// Per-item outcome of a bulk write that could not commit atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailureReport {
    /// Items that were applied and remain applied.
    pub succeeded: Vec<PermissionId>,
    /// Items that were not applied.
    pub failed: Vec<BulkItemFailure>,
}

impl Display for BulkFailureReport {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{} item(s) applied, {} item(s) failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Subject is blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Persistence layer could not be reached. Safe to retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Bulk write could not commit atomically; carries the per-item outcome.
    #[error("partial bulk failure: {0}")]
    PartialBulkFailure(BulkFailureReport),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the caller may retry the failed operation unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}
