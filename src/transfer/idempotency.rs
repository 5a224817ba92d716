//! Idempotency Guard
//!
//! Runs inside the transfer's atomic unit. The key slot stays locked until
//! that unit commits or rolls back, so two requests with the same key can
//! never both observe [`GuardOutcome::Miss`].

use tracing::{debug, warn};

use super::error::TransferError;
use super::types::IdempotencyKey;
use crate::core_types::TransactionId;
use crate::store::{LedgerStore, LedgerTx, StoreError};

/// Result of [`IdempotencyGuard::check_or_reserve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Key already produced this transaction
    Hit(TransactionId),
    /// Key is free; the slot is now held by the caller's unit
    Miss,
}

pub struct IdempotencyGuard;

impl IdempotencyGuard {
    /// Lock the key slot and look up an existing record. Writes nothing.
    pub async fn check_or_reserve(
        tx: &mut dyn LedgerTx,
        key: &IdempotencyKey,
    ) -> Result<GuardOutcome, TransferError> {
        match tx.lock_idempotency_key(key.as_str()).await? {
            Some(transaction_id) => {
                debug!(key = %key, transaction_id, "Idempotency hit");
                Ok(GuardOutcome::Hit(transaction_id))
            }
            None => Ok(GuardOutcome::Miss),
        }
    }

    /// Register `key -> transaction_id` in the caller's unit.
    ///
    /// A unique violation is returned as-is so the caller can roll back and
    /// call [`IdempotencyGuard::resolve_conflict`].
    pub async fn record(
        tx: &mut dyn LedgerTx,
        key: &IdempotencyKey,
        transaction_id: TransactionId,
    ) -> Result<(), StoreError> {
        tx.insert_idempotency_record(key.as_str(), transaction_id)
            .await?;
        Ok(())
    }

    /// After a unique violation on the key: the winner's record is committed,
    /// read it outside the aborted unit.
    pub async fn resolve_conflict(
        store: &dyn LedgerStore,
        key: &IdempotencyKey,
    ) -> Result<TransactionId, TransferError> {
        match store.find_idempotency_record(key.as_str()).await? {
            Some(record) => {
                warn!(
                    key = %key,
                    transaction_id = record.transaction_id,
                    "Idempotency key raced past the slot lock, replaying winner"
                );
                Ok(record.transaction_id)
            }
            None => Err(TransferError::Conflict(format!(
                "idempotency key {} conflicted but no record is visible",
                key
            ))),
        }
    }
}
