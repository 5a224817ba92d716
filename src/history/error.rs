//! History query errors

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl HistoryError {
    pub fn code(&self) -> &'static str {
        match self {
            HistoryError::InvalidFilter(_) => "INVALID_FILTER",
            HistoryError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            HistoryError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            HistoryError::InvalidFilter(_) => 400,
            HistoryError::ServiceUnavailable(_) => 503,
            HistoryError::DatabaseError(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HistoryError::ServiceUnavailable(_))
    }
}

impl From<StoreError> for HistoryError {
    fn from(e: StoreError) -> Self {
        if e.is_transient() {
            HistoryError::ServiceUnavailable(e.to_string())
        } else {
            HistoryError::DatabaseError(e.to_string())
        }
    }
}
