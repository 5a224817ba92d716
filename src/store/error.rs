//! Store error types
//!
//! `sqlx` errors are classified by SQLSTATE so callers can tell a lock
//! timeout from a constraint violation without parsing messages.

use thiserror::Error;

/// Persistence-port error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Lock wait timed out")]
    LockTimeout,

    #[error("Transaction aborted by concurrent update: {0}")]
    Contention(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Transient failures: the identical request may be resubmitted.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::LockTimeout | StoreError::Contention(_) | StoreError::Unavailable(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                let constraint = db.constraint().unwrap_or("unknown").to_string();
                match db.code().as_deref() {
                    Some("23505") => StoreError::UniqueViolation(constraint),
                    Some("23514") => StoreError::CheckViolation(constraint),
                    // numeric_value_out_of_range
                    Some("22003") => StoreError::CheckViolation(db.message().to_string()),
                    // lock_not_available (lock_timeout), query_canceled (statement_timeout)
                    Some("55P03") | Some("57014") => StoreError::LockTimeout,
                    // deadlock_detected, serialization_failure
                    Some("40P01") | Some("40001") => {
                        StoreError::Contention(db.message().to_string())
                    }
                    _ => StoreError::Database(e.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}
