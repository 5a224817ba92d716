//! Ledger Store
//!
//! Persistence port for accounts, transaction records and idempotency
//! records, plus its two implementations:
//!
//! - [`PgLedgerStore`]: PostgreSQL, row locks via `SELECT ... FOR UPDATE`,
//!   key-slot locks via transaction-scoped advisory locks
//! - [`MemoryLedgerStore`]: in-process store with the same lock and
//!   commit semantics, used by tests and local runs
//!
//! # Atomic unit
//!
//! [`LedgerStore::begin`] opens a [`LedgerTx`]. Every lock taken through it
//! is held until [`LedgerTx::commit`] or [`LedgerTx::rollback`]. Dropping an
//! uncommitted `LedgerTx` discards all of its writes.

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;

use async_trait::async_trait;

pub use error::StoreError;
pub use memory::MemoryLedgerStore;
pub use models::{
    Account, HistoryEntry, IdempotencyRecord, NewTransaction, TransactionRecord, TransactionType,
};
pub use pg::PgLedgerStore;

use crate::core_types::{AccountId, TransactionId, UserId};
use crate::money::Money;

/// Store-wide operations (outside any atomic unit)
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get adapter name for logging
    fn name(&self) -> &'static str;

    /// Open an atomic unit.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    /// Committed idempotency record for `key`, if any.
    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Ids of every account owned by `owner_id`.
    async fn owned_account_ids(&self, owner_id: UserId) -> Result<Vec<AccountId>, StoreError>;

    /// One page of history plus the total number of matching rows.
    ///
    /// Reads a single consistent snapshot and takes no locks.
    async fn query_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<(Vec<HistoryEntry>, u64), StoreError>;
}

/// Operations inside one atomic unit
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the slot of `key` (whether or not a record exists yet) and return
    /// the transaction id already stored under it.
    async fn lock_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<TransactionId>, StoreError>;

    /// Load an account under an exclusive row lock.
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Load an account by its number without an explicit lock.
    async fn find_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// `balance = balance - amount`
    async fn debit(&mut self, id: AccountId, amount: Money) -> Result<(), StoreError>;

    /// `balance = balance + amount`
    async fn credit(&mut self, id: AccountId, amount: Money) -> Result<(), StoreError>;

    async fn insert_transaction(
        &mut self,
        new: NewTransaction,
    ) -> Result<TransactionRecord, StoreError>;

    async fn insert_idempotency_record(
        &mut self,
        key: &str,
        transaction_id: TransactionId,
    ) -> Result<IdempotencyRecord, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Fully enumerated history filter.
///
/// Can only be built together with a non-empty owned-account set, so a store
/// never runs a history query without the authorization clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    owned_account_ids: Vec<AccountId>,
    kind: Option<TransactionType>,
    account_number: Option<String>,
    offset: u64,
    limit: u32,
}

impl HistoryQuery {
    /// Returns `None` when `owned_account_ids` is empty.
    pub fn new(
        owned_account_ids: Vec<AccountId>,
        kind: Option<TransactionType>,
        account_number: Option<String>,
        offset: u64,
        limit: u32,
    ) -> Option<Self> {
        if owned_account_ids.is_empty() {
            return None;
        }
        Some(Self {
            owned_account_ids,
            kind,
            account_number,
            offset,
            limit,
        })
    }

    pub fn owned_account_ids(&self) -> &[AccountId] {
        &self.owned_account_ids
    }

    pub fn kind(&self) -> Option<TransactionType> {
        self.kind
    }

    pub fn account_number(&self) -> Option<&str> {
        self.account_number.as_deref()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Authorization plus optional filters, evaluated against one row.
    ///
    /// Stores that filter in SQL must express exactly this predicate.
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        let record = &entry.record;
        let owned = |id: Option<AccountId>| id.is_some_and(|id| self.owned_account_ids.contains(&id));
        if !owned(record.from_account_id) && !owned(record.to_account_id) {
            return false;
        }

        if let Some(kind) = self.kind
            && record.kind != kind
        {
            return false;
        }

        if let Some(number) = self.account_number.as_deref() {
            let from = entry.from_account_number.as_deref() == Some(number);
            let to = entry.to_account_number.as_deref() == Some(number);
            if !from && !to {
                return false;
            }
        }

        true
    }
}
