//! Transfer request/response types

use serde::Serialize;
use utoipa::ToSchema;

use super::error::TransferError;
use crate::core_types::{AccountId, TransactionId, UserId};
use crate::money::Money;

/// Matches `idempotency_records.key VARCHAR(255)`
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

pub const MSG_TRANSFER_SUCCESS: &str = "Transfer successful";
pub const MSG_TRANSFER_REPLAYED: &str = "Transfer already processed (Idempotent)";

/// Client-supplied idempotency key, validated on construction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self, TransferError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TransferError::MissingIdempotencyKey);
        }
        if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(TransferError::InvalidIdempotencyKey(format!(
                "longer than {} bytes",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(TransferError::InvalidIdempotencyKey(
                "contains control characters".into(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One transfer between two existing accounts
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub idempotency_key: IdempotencyKey,
    pub from_account_id: AccountId,
    pub to_account_number: String,
    pub amount: Money,
    /// Authenticated user; when set, must own the sender account
    pub initiated_by: Option<UserId>,
}

impl TransferRequest {
    pub fn new(
        idempotency_key: IdempotencyKey,
        from_account_id: AccountId,
        to_account_number: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            idempotency_key,
            from_account_id,
            to_account_number: to_account_number.into(),
            amount,
            initiated_by: None,
        }
    }

    pub fn initiated_by(mut self, user_id: UserId) -> Self {
        self.initiated_by = Some(user_id);
        self
    }

    /// Checks that need no store access
    pub fn validate(&self) -> Result<(), TransferError> {
        Money::positive(self.amount.as_decimal())?;
        if self.to_account_number.trim().is_empty() {
            return Err(TransferError::InvalidReceiver);
        }
        Ok(())
    }
}

/// Result of a transfer or of its replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    #[schema(example = "Transfer successful")]
    pub message: String,
    #[schema(value_type = i64, example = 1)]
    pub transaction_id: TransactionId,
    #[serde(skip)]
    pub replayed: bool,
}

impl TransferReceipt {
    pub fn executed(transaction_id: TransactionId) -> Self {
        Self {
            message: MSG_TRANSFER_SUCCESS.to_string(),
            transaction_id,
            replayed: false,
        }
    }

    pub fn replayed(transaction_id: TransactionId) -> Self {
        Self {
            message: MSG_TRANSFER_REPLAYED.to_string(),
            transaction_id,
            replayed: true,
        }
    }
}
