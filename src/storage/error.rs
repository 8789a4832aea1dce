//! Low-level storage failures and their translation into [`CoreError`].

use std::time::Duration;

use thiserror::Error;

use crate::error::{CoreError, PersistenceFailure};

/// Failure reported by a database backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("transaction exceeded {0:?}")]
    Timeout(Duration),

    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: &'static str },

    #[error("foreign key constraint `{constraint}` violated")]
    ForeignKeyViolation { constraint: &'static str },

    #[error("null value in required column `{column}`")]
    NotNullViolation { column: &'static str },

    #[error("database client failed to initialize: {0}")]
    ConnectionInit(String),

    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// SQLSTATE-style code, as a relational backend would report it.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Timeout(_) => "57014",
            DbError::UniqueViolation { .. } => "23505",
            DbError::ForeignKeyViolation { .. } => "23503",
            DbError::NotNullViolation { .. } => "23502",
            DbError::ConnectionInit(_) => "08001",
            DbError::Other(_) => "XX000",
        }
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        tracing::debug!(sqlstate = err.code(), error = %err, "Database error");
        match err {
            DbError::Timeout(timeout) => CoreError::DatabaseTimeout { timeout },
            DbError::UniqueViolation { constraint } => {
                CoreError::PersistenceFailed(PersistenceFailure::Duplicate { constraint })
            }
            DbError::ForeignKeyViolation { constraint } => {
                CoreError::PersistenceFailed(PersistenceFailure::DanglingReference { constraint })
            }
            DbError::NotNullViolation { column } => CoreError::ValidationFailed {
                field: column,
                reason: "is required".to_string(),
            },
            DbError::ConnectionInit(message) => {
                CoreError::PersistenceFailed(PersistenceFailure::Unavailable(message))
            }
            DbError::Other(message) => {
                tracing::error!(error = %message, "Unclassified database error");
                CoreError::Internal(message)
            }
        }
    }
}
