//! Error types for choreboard.
//!
//! Validation failures are rejected before any write reaches the backing
//! store. Backend failures are wrapped, never swallowed, so callers can
//! branch on the outcome. A mark-done that finds the same user already on
//! the record is an outcome (`MarkDoneOutcome::AlreadyCompleted`), not an
//! error.

use thiserror::Error;

/// Main error type for choreboard operations.
#[derive(Error, Debug)]
pub enum Error {
    // Validation failures (rejected before any write)
    #[error("Name must not be empty")]
    EmptyName,

    #[error("Invalid day range: min_days {min} must be <= max_days {max}")]
    InvalidDayRange { min: i64, max: i64 },

    #[error("Day counts must not be negative (got min {min}, max {max})")]
    NegativeDays { min: i64, max: i64 },

    #[error("A category named '{0}' already exists")]
    DuplicateCategory(String),

    // Missing records
    #[error("Chore not found: {0}")]
    ChoreNotFound(String),

    #[error("Completion not found: {0}")]
    CompletionNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    // Store failures (propagated, no automatic retry)
    #[error("Store error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error is a pre-write validation rejection, suitable
    /// for inline display next to the offending form field.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyName
                | Error::InvalidDayRange { .. }
                | Error::NegativeDays { .. }
                | Error::DuplicateCategory(_)
        )
    }
}

/// Result type alias for choreboard operations.
pub type Result<T> = std::result::Result<T, Error>;
