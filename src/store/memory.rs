//! In-memory Ledger Store
//!
//! Same contract as the PostgreSQL store:
//! - key-slot and account locks are async mutexes held until the unit ends,
//!   acquisition is bounded by the lock timeout
//! - writes are staged in the unit and applied under one state lock on
//!   commit, so no other reader ever sees a partial transfer
//! - balance and uniqueness constraints are checked on write and again on
//!   commit, like `CHECK`/`UNIQUE` constraints would be

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::{
    Account, HistoryEntry, HistoryQuery, IdempotencyRecord, LedgerStore, LedgerTx,
    NewTransaction, StoreError, TransactionRecord,
};
use crate::core_types::{AccountId, Clock, SystemClock, TransactionId, UserId};
use crate::money::{Money, MoneyError};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Table of async mutexes, one per key.
///
/// A slot exists only while some unit holds or waits on it; the last one
/// out removes it.
struct LockTable<K: Eq + Hash> {
    slots: DashMap<K, Arc<tokio::sync::Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    async fn acquire(
        self: &Arc<Self>,
        key: K,
        timeout: Duration,
    ) -> Result<SlotGuard<K>, StoreError> {
        let slot = self.slots.entry(key.clone()).or_default().clone();
        let acquired = tokio::time::timeout(timeout, slot.lock_owned()).await;
        match acquired {
            Ok(guard) => Ok(SlotGuard {
                guard: Some(guard),
                table: self.clone(),
                key,
            }),
            Err(_) => {
                self.release(&key);
                Err(StoreError::LockTimeout)
            }
        }
    }

    /// Drop the slot if the table holds the only reference.
    fn release(&self, key: &K) {
        self.slots.remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// Held lock on one slot; unlocks and cleans up the slot on drop.
struct SlotGuard<K: Eq + Hash + Clone> {
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable<K>>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for SlotGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.release(&self.key);
    }
}

/// Committed state
#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<TransactionRecord>,
    idempotency: HashMap<String, IdempotencyRecord>,
    next_account_id: AccountId,
}

impl LedgerState {
    fn apply_delta(&self, id: AccountId, delta: Decimal) -> Result<Money, StoreError> {
        let account = self
            .accounts
            .get(&id)
            .ok_or_else(|| StoreError::Database(format!("account {} not found", id)))?;
        Money::from_decimal(account.balance.as_decimal() + delta).map_err(|e| match e {
            MoneyError::Negative => StoreError::CheckViolation("accounts_balance_check".into()),
            other => StoreError::CheckViolation(other.to_string()),
        })
    }

    fn account_number(&self, id: Option<AccountId>) -> Option<String> {
        id.and_then(|id| self.accounts.get(&id))
            .map(|a| a.account_number.clone())
    }
}

fn lock_state(state: &Mutex<LedgerState>) -> Result<MutexGuard<'_, LedgerState>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Unavailable("ledger state poisoned".into()))
}

/// In-process ledger store
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    key_locks: Arc<LockTable<String>>,
    account_locks: Arc<LockTable<AccountId>>,
    next_transaction_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                next_account_id: 1,
                ..Default::default()
            })),
            key_locks: Arc::new(LockTable::new()),
            account_locks: Arc::new(LockTable::new()),
            next_transaction_id: Arc::new(AtomicI64::new(1)),
            clock,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Provision an account (stands in for the external provisioning service).
    pub fn open_account(
        &self,
        owner_id: UserId,
        account_number: &str,
        balance: Money,
    ) -> Result<Account, StoreError> {
        let mut state = lock_state(&self.state)?;
        if state
            .accounts
            .values()
            .any(|a| a.account_number == account_number)
        {
            return Err(StoreError::UniqueViolation(
                "accounts_account_number_key".into(),
            ));
        }

        let account = Account {
            id: state.next_account_id,
            account_number: account_number.to_string(),
            balance,
            owner_id,
        };
        state.next_account_id += 1;
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    /// Append a ledger row produced outside the transfer engine
    /// (deposits, withdrawals, imports). Balances are not touched.
    pub fn record_external(&self, new: NewTransaction) -> Result<TransactionRecord, StoreError> {
        let record = TransactionRecord {
            id: self.next_transaction_id.fetch_add(1, Ordering::SeqCst),
            amount: new.amount,
            from_account_id: new.from_account_id,
            to_account_id: new.to_account_id,
            kind: new.kind,
            created_at: self.clock.now(),
        };
        lock_state(&self.state)?.transactions.push(record.clone());
        Ok(record)
    }

    /// Committed view of one account.
    pub fn account(&self, id: AccountId) -> Option<Account> {
        lock_state(&self.state)
            .ok()
            .and_then(|s| s.accounts.get(&id).cloned())
    }

    pub fn transaction_count(&self) -> usize {
        lock_state(&self.state)
            .map(|s| s.transactions.len())
            .unwrap_or(0)
    }

    pub fn idempotency_record_count(&self) -> usize {
        lock_state(&self.state)
            .map(|s| s.idempotency.len())
            .unwrap_or(0)
    }

    /// Live lock slots, keys plus accounts.
    #[cfg(test)]
    pub(crate) fn lock_slot_count(&self) -> usize {
        self.key_locks.slots.len() + self.account_locks.slots.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        Ok(Box::new(MemoryLedgerTx {
            state: self.state.clone(),
            key_locks: self.key_locks.clone(),
            account_locks: self.account_locks.clone(),
            next_transaction_id: self.next_transaction_id.clone(),
            clock: self.clock.clone(),
            lock_timeout: self.lock_timeout,
            key_guards: Vec::new(),
            account_guards: Vec::new(),
            deltas: HashMap::new(),
            transactions: Vec::new(),
            idempotency: Vec::new(),
        }))
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(lock_state(&self.state)?.idempotency.get(key).cloned())
    }

    async fn owned_account_ids(&self, owner_id: UserId) -> Result<Vec<AccountId>, StoreError> {
        Ok(lock_state(&self.state)?
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.id)
            .collect())
    }

    async fn query_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<(Vec<HistoryEntry>, u64), StoreError> {
        let state = lock_state(&self.state)?;

        let mut matching: Vec<HistoryEntry> = state
            .transactions
            .iter()
            .map(|record| HistoryEntry {
                record: record.clone(),
                from_account_number: state.account_number(record.from_account_id),
                to_account_number: state.account_number(record.to_account_id),
            })
            .filter(|entry| query.matches(entry))
            .collect();
        drop(state);

        matching.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.record.id.cmp(&a.record.id))
        });

        let count = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit() as usize)
            .collect();

        Ok((page, count))
    }
}

/// One atomic unit against [`MemoryLedgerStore`]
struct MemoryLedgerTx {
    state: Arc<Mutex<LedgerState>>,
    key_locks: Arc<LockTable<String>>,
    account_locks: Arc<LockTable<AccountId>>,
    next_transaction_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    /// Released on drop, i.e. after commit or rollback
    key_guards: Vec<SlotGuard<String>>,
    account_guards: Vec<SlotGuard<AccountId>>,
    deltas: HashMap<AccountId, Decimal>,
    transactions: Vec<TransactionRecord>,
    idempotency: Vec<IdempotencyRecord>,
}

impl MemoryLedgerTx {
    fn staged_account(&self, account: Account) -> Result<Account, StoreError> {
        match self.deltas.get(&account.id) {
            Some(delta) => {
                let state = lock_state(&self.state)?;
                let balance = state.apply_delta(account.id, *delta)?;
                Ok(Account { balance, ..account })
            }
            None => Ok(account),
        }
    }

    fn stage_delta(&mut self, id: AccountId, delta: Decimal) -> Result<(), StoreError> {
        let staged = self.deltas.get(&id).copied().unwrap_or_default() + delta;
        // Constraint check at write time
        lock_state(&self.state)?.apply_delta(id, staged)?;
        self.deltas.insert(id, staged);
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<TransactionId>, StoreError> {
        if !self.key_guards.iter().any(|g| g.key == key) {
            let guard = self
                .key_locks
                .acquire(key.to_string(), self.lock_timeout)
                .await?;
            self.key_guards.push(guard);
        }

        if let Some(staged) = self.idempotency.iter().find(|r| r.key == key) {
            return Ok(Some(staged.transaction_id));
        }
        Ok(lock_state(&self.state)?
            .idempotency
            .get(key)
            .map(|r| r.transaction_id))
    }

    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        if !self.account_guards.iter().any(|g| g.key == id) {
            let guard = self.account_locks.acquire(id, self.lock_timeout).await?;
            self.account_guards.push(guard);
        }

        let committed = lock_state(&self.state)?.accounts.get(&id).cloned();
        committed.map(|a| self.staged_account(a)).transpose()
    }

    async fn find_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        let committed = lock_state(&self.state)?
            .accounts
            .values()
            .find(|a| a.account_number == account_number)
            .cloned();
        committed.map(|a| self.staged_account(a)).transpose()
    }

    async fn debit(&mut self, id: AccountId, amount: Money) -> Result<(), StoreError> {
        self.stage_delta(id, -amount.as_decimal())
    }

    async fn credit(&mut self, id: AccountId, amount: Money) -> Result<(), StoreError> {
        self.stage_delta(id, amount.as_decimal())
    }

    async fn insert_transaction(
        &mut self,
        new: NewTransaction,
    ) -> Result<TransactionRecord, StoreError> {
        let record = TransactionRecord {
            id: self.next_transaction_id.fetch_add(1, Ordering::SeqCst),
            amount: new.amount,
            from_account_id: new.from_account_id,
            to_account_id: new.to_account_id,
            kind: new.kind,
            created_at: self.clock.now(),
        };
        self.transactions.push(record.clone());
        Ok(record)
    }

    async fn insert_idempotency_record(
        &mut self,
        key: &str,
        transaction_id: TransactionId,
    ) -> Result<IdempotencyRecord, StoreError> {
        let taken = self.idempotency.iter().any(|r| r.key == key)
            || lock_state(&self.state)?.idempotency.contains_key(key);
        if taken {
            return Err(StoreError::UniqueViolation("idempotency_records_pkey".into()));
        }

        let record = IdempotencyRecord {
            key: key.to_string(),
            transaction_id,
            created_at: self.clock.now(),
        };
        self.idempotency.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state)?;

        // Validate everything before touching anything
        if let Some(dup) = self
            .idempotency
            .iter()
            .find(|r| state.idempotency.contains_key(&r.key))
        {
            debug!(key = %dup.key, "Idempotency key committed concurrently");
            return Err(StoreError::UniqueViolation("idempotency_records_pkey".into()));
        }
        let mut balances = Vec::with_capacity(self.deltas.len());
        for (id, delta) in &self.deltas {
            balances.push((*id, state.apply_delta(*id, *delta)?));
        }

        for (id, balance) in balances {
            if let Some(account) = state.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        state.transactions.extend(self.transactions.iter().cloned());
        for record in &self.idempotency {
            state.idempotency.insert(record.key.clone(), record.clone());
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged writes and lock guards are dropped with `self`
        Ok(())
    }
}
