//! Transfer Coordinator
//!
//! Executes one transfer as a single atomic unit against the ledger store:
//!
//! ```text
//! key lock ─► sender lock ─► balance check ─► receiver lookup
//!          ─► debit/credit ─► transaction record ─► idempotency record ─► commit
//! ```
//!
//! Lock order is always key slot first, then sender row. Any failure rolls
//! the unit back, so no partial transfer is ever visible.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::idempotency::{GuardOutcome, IdempotencyGuard};
use super::types::{TransferReceipt, TransferRequest};
use crate::core_types::TransactionId;
use crate::store::{LedgerStore, LedgerTx, NewTransaction, StoreError, TransactionRecord};

/// How the unit ended, before commit
enum Outcome {
    Replayed(TransactionId),
    Executed(TransactionRecord),
    /// Insert of the idempotency record hit the unique key
    KeyConflict,
}

/// Transfer Coordinator
pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Move `amount` from `from_account_id` to `to_account_number` exactly once
    /// per idempotency key.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferReceipt, TransferError> {
        if let Err(e) = req.validate() {
            debug!(key = %req.idempotency_key, error = %e, "Transfer request invalid");
            return Err(e);
        }

        let mut tx = self.store.begin().await?;
        let outcome = match self.execute(tx.as_mut(), &req).await {
            Ok(outcome) => outcome,
            Err(e) => {
                Self::abort(tx, &req).await;
                if e.is_retryable() {
                    warn!(key = %req.idempotency_key, error = %e, "Transfer aborted, retryable");
                } else if e.is_validation() {
                    debug!(key = %req.idempotency_key, error = %e, "Transfer request invalid");
                } else {
                    info!(key = %req.idempotency_key, error = %e, "Transfer rejected");
                }
                return Err(e);
            }
        };

        match outcome {
            Outcome::Replayed(transaction_id) => {
                Self::abort(tx, &req).await;
                info!(
                    key = %req.idempotency_key,
                    transaction_id, "Transfer already processed, replaying"
                );
                Ok(TransferReceipt::replayed(transaction_id))
            }
            Outcome::KeyConflict => {
                Self::abort(tx, &req).await;
                self.replay_winner(&req).await
            }
            Outcome::Executed(record) => match tx.commit().await {
                Ok(()) => {
                    info!(
                        key = %req.idempotency_key,
                        transaction_id = record.id,
                        from_account_id = req.from_account_id,
                        to_account = %req.to_account_number,
                        amount = %record.amount,
                        "Transfer committed"
                    );
                    Ok(TransferReceipt::executed(record.id))
                }
                Err(StoreError::UniqueViolation(_)) => self.replay_winner(&req).await,
                Err(StoreError::CheckViolation(constraint)) => {
                    warn!(
                        key = %req.idempotency_key,
                        constraint = %constraint,
                        "Receiver balance out of range at commit"
                    );
                    Err(TransferError::Overflow)
                }
                Err(e) => {
                    error!(key = %req.idempotency_key, error = %e, "Transfer commit failed");
                    Err(e.into())
                }
            },
        }
    }

    async fn execute(
        &self,
        tx: &mut dyn LedgerTx,
        req: &TransferRequest,
    ) -> Result<Outcome, TransferError> {
        // 1. Idempotency guard (holds the key slot until the unit ends)
        if let GuardOutcome::Hit(transaction_id) =
            IdempotencyGuard::check_or_reserve(tx, &req.idempotency_key).await?
        {
            return Ok(Outcome::Replayed(transaction_id));
        }

        // 2. Sender under row lock
        let sender = tx
            .lock_account(req.from_account_id)
            .await?
            .ok_or(TransferError::SenderNotFound)?;

        // Someone else's account is reported as absent
        if let Some(user_id) = req.initiated_by
            && sender.owner_id != user_id
        {
            warn!(
                user_id,
                from_account_id = sender.id,
                "Transfer from an account the user does not own"
            );
            return Err(TransferError::SenderNotFound);
        }

        if sender.account_number == req.to_account_number {
            return Err(TransferError::SameAccount);
        }

        // 3. Funds
        sender
            .balance
            .checked_sub(req.amount)
            .map_err(|_| TransferError::InsufficientFunds)?;

        // 4. Receiver, unlocked: its balance is only ever changed relatively
        let receiver = tx
            .find_account_by_number(&req.to_account_number)
            .await?
            .ok_or(TransferError::ReceiverNotFound)?;
        if receiver.id == sender.id {
            return Err(TransferError::SameAccount);
        }
        receiver.balance.checked_add(req.amount)?;

        // 5-6. Balances
        tx.debit(sender.id, req.amount).await?;
        // A concurrent credit may have filled the receiver since the lookup
        tx.credit(receiver.id, req.amount)
            .await
            .map_err(|e| match e {
                StoreError::CheckViolation(_) => TransferError::Overflow,
                other => other.into(),
            })?;

        // 7. Ledger row
        let record = tx
            .insert_transaction(NewTransaction::transfer(sender.id, receiver.id, req.amount))
            .await?;

        // 8. Idempotency record
        match IdempotencyGuard::record(tx, &req.idempotency_key, record.id).await {
            Ok(()) => Ok(Outcome::Executed(record)),
            Err(StoreError::UniqueViolation(_)) => Ok(Outcome::KeyConflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn replay_winner(&self, req: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        let transaction_id =
            IdempotencyGuard::resolve_conflict(self.store.as_ref(), &req.idempotency_key).await?;
        Ok(TransferReceipt::replayed(transaction_id))
    }

    /// Roll back; a failed rollback still discards the unit when it is dropped.
    async fn abort(tx: Box<dyn LedgerTx>, req: &TransferRequest) {
        if let Err(e) = tx.rollback().await {
            warn!(key = %req.idempotency_key, error = %e, "Rollback failed");
        }
    }
}
