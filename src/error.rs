//! Domain error taxonomy shared by the transaction executor and the quote guard.
//!
//! Every failure a caller can observe from a guarded mutation is one of the
//! variants below. Low-level storage failures are translated into these kinds
//! at the transaction boundary (see `storage::error`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::quoting::types::{Operation, QuoteStatus};
use crate::resilience::retries::Retryable;

/// Result type for guarded operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the atomic executor and the optimistic concurrency guard.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    /// The referenced record does not exist.
    #[error("{entity} not found with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// The record's status forbids the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(StateViolation),

    /// The caller's expected version no longer matches the stored one.
    #[error("Version conflict: expected version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// The acting user does not own the record.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// The unit of work did not finish within its timeout and was rolled back.
    #[error("Database operation timed out after {timeout:?}")]
    DatabaseTimeout { timeout: Duration },

    /// Constraint violation or unavailable infrastructure.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(PersistenceFailure),

    /// Caller-supplied data violates a required-field or value constraint.
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: &'static str, reason: String },

    /// Anything else. The message is for logs, not for end users.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a status check rejected an operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateViolation {
    /// The operation is not permitted from the current status.
    #[error("cannot {operation} a quote in status {current}")]
    Disallowed {
        current: QuoteStatus,
        operation: Operation,
        /// First status from which the operation would be permitted.
        allowed: Option<QuoteStatus>,
    },

    /// The quote has already been sent; sending is a one-shot transition.
    #[error("quote was already sent")]
    AlreadySent { sent_at: Option<DateTime<Utc>> },
}

/// Sub-reason of a [`CoreError::PersistenceFailed`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceFailure {
    #[error("duplicate value violates `{constraint}`")]
    Duplicate { constraint: &'static str },

    #[error("`{constraint}` references a missing record")]
    DanglingReference { constraint: &'static str },

    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }
}

impl Retryable for CoreError {
    /// Timeouts, unavailable backends and unclassified failures are transient.
    /// Constraint, validation and business-rule failures are deterministic.
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::DatabaseTimeout { .. }
            | CoreError::PersistenceFailed(PersistenceFailure::Unavailable(_))
            | CoreError::Internal(_) => true,
            CoreError::NotFound { .. }
            | CoreError::InvalidState(_)
            | CoreError::VersionConflict { .. }
            | CoreError::Forbidden { .. }
            | CoreError::PersistenceFailed(_)
            | CoreError::ValidationFailed { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::VersionConflict {
            expected: 3,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Version conflict: expected version 3, found 4"
        );

        let err = CoreError::InvalidState(StateViolation::Disallowed {
            current: QuoteStatus::Sent,
            operation: Operation::Update,
            allowed: Some(QuoteStatus::Draft),
        });
        assert_eq!(
            err.to_string(),
            "Invalid state: cannot update a quote in status SENT"
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(CoreError::DatabaseTimeout {
            timeout: Duration::from_secs(10)
        }
        .is_retryable());
        assert!(CoreError::PersistenceFailed(PersistenceFailure::Unavailable("down".into()))
            .is_retryable());
        assert!(!CoreError::PersistenceFailed(PersistenceFailure::Duplicate {
            constraint: "quotes_reference_key"
        })
        .is_retryable());
        assert!(!CoreError::validation("title", "required").is_retryable());
        assert!(!CoreError::VersionConflict {
            expected: 1,
            actual: 2
        }
        .is_retryable());
    }
}
