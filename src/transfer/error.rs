//! Transfer Error Types
//!
//! Every variant carries a stable API code, an HTTP status and a retry
//! classification. A duplicate idempotency key is never an error: it is a
//! successful replay.

use thiserror::Error;

use crate::money::MoneyError;
use crate::store::StoreError;

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Idempotency-Key header is required")]
    MissingIdempotencyKey,

    #[error("Invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount supports at most 2 decimal places")]
    PrecisionOverflow,

    #[error("Amount would cause overflow")]
    Overflow,

    #[error("Receiver account number is required")]
    InvalidReceiver,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    // === Account Errors ===
    #[error("Sender account not found")]
    SenderNotFound,

    #[error("Receiver account not found")]
    ReceiverNotFound,

    #[error("Insufficient funds")]
    InsufficientFunds,

    // === Transient Errors ===
    #[error("Timed out waiting for a lock, retry with the same key")]
    LockTimeout,

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
            TransferError::InvalidIdempotencyKey(_) => "INVALID_IDEMPOTENCY_KEY",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::PrecisionOverflow => "PRECISION_OVERFLOW",
            TransferError::Overflow => "OVERFLOW",
            TransferError::InvalidReceiver => "INVALID_RECEIVER",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::SenderNotFound | TransferError::ReceiverNotFound => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::LockTimeout => "LOCK_TIMEOUT",
            TransferError::Conflict(_) => "CONFLICT",
            TransferError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::MissingIdempotencyKey
            | TransferError::InvalidIdempotencyKey(_)
            | TransferError::InvalidAmount
            | TransferError::PrecisionOverflow
            | TransferError::Overflow
            | TransferError::InvalidReceiver
            | TransferError::SameAccount
            | TransferError::InsufficientFunds => 400,
            TransferError::SenderNotFound | TransferError::ReceiverNotFound => 404,
            TransferError::Conflict(_) => 409,
            TransferError::DatabaseError(_) => 500,
            TransferError::LockTimeout | TransferError::ServiceUnavailable(_) => 503,
        }
    }

    /// Whether the identical request (same key) may be resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::LockTimeout
                | TransferError::Conflict(_)
                | TransferError::ServiceUnavailable(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        self.http_status() == 400 && !matches!(self, TransferError::InsufficientFunds)
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LockTimeout => TransferError::LockTimeout,
            StoreError::Contention(msg) => TransferError::Conflict(msg),
            StoreError::Unavailable(msg) => TransferError::ServiceUnavailable(msg),
            other => TransferError::DatabaseError(other.to_string()),
        }
    }
}

impl From<MoneyError> for TransferError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::PrecisionOverflow { .. } => TransferError::PrecisionOverflow,
            MoneyError::Overflow => TransferError::Overflow,
            MoneyError::InvalidAmount | MoneyError::Negative | MoneyError::InvalidFormat(_) => {
                TransferError::InvalidAmount
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(TransferError::SenderNotFound.code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(TransferError::ReceiverNotFound.code(), "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::MissingIdempotencyKey.http_status(), 400);
        assert_eq!(TransferError::InsufficientFunds.http_status(), 400);
        assert_eq!(TransferError::SenderNotFound.http_status(), 404);
        assert_eq!(TransferError::LockTimeout.http_status(), 503);
        assert_eq!(TransferError::DatabaseError("x".into()).http_status(), 500);
    }

    #[test]
    fn test_retry_classification() {
        assert!(TransferError::LockTimeout.is_retryable());
        assert!(TransferError::ServiceUnavailable("pool".into()).is_retryable());
        assert!(!TransferError::InsufficientFunds.is_retryable());
        assert!(!TransferError::SameAccount.is_retryable());
    }

    #[test]
    fn test_validation_classification() {
        assert!(TransferError::InvalidAmount.is_validation());
        assert!(TransferError::SameAccount.is_validation());
        assert!(!TransferError::InsufficientFunds.is_validation());
        assert!(!TransferError::SenderNotFound.is_validation());
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(
            TransferError::from(StoreError::LockTimeout),
            TransferError::LockTimeout
        );
        assert!(TransferError::from(StoreError::Contention("deadlock".into())).is_retryable());
        assert!(matches!(
            TransferError::from(StoreError::Corrupt("balance".into())),
            TransferError::DatabaseError(_)
        ));
    }

    #[test]
    fn test_money_error_mapping() {
        assert_eq!(
            TransferError::from(MoneyError::PrecisionOverflow { provided: 3, max: 2 }),
            TransferError::PrecisionOverflow
        );
        assert_eq!(
            TransferError::from(MoneyError::Negative),
            TransferError::InvalidAmount
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferError::InsufficientFunds.to_string(), "Insufficient funds");
    }
}
