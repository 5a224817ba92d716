//! PostgreSQL Ledger Store
//!
//! - key-slot lock: `pg_advisory_xact_lock(hashtextextended(key, 0))`,
//!   released by commit/rollback
//! - sender lock: `SELECT ... FOR UPDATE`
//! - balance writes are relative (`balance = balance ± $1`)
//! - every unit sets `lock_timeout`, so waits end in SQLSTATE 55P03

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use super::{
    Account, HistoryEntry, HistoryQuery, IdempotencyRecord, LedgerStore, LedgerTx,
    NewTransaction, StoreError, TransactionRecord, TransactionType,
};
use crate::core_types::{AccountId, Clock, TransactionId, UserId};
use crate::money::Money;

const HISTORY_FILTER: &str = r#"
    FROM transaction_records t
    LEFT JOIN accounts fa ON fa.id = t.from_account_id
    LEFT JOIN accounts ta ON ta.id = t.to_account_id
    WHERE (t.from_account_id = ANY($1) OR t.to_account_id = ANY($1))
      AND ($2::text IS NULL OR t.type = $2)
      AND ($3::text IS NULL OR fa.account_number = $3 OR ta.account_number = $3)
"#;

/// Ledger store backed by a PostgreSQL pool
pub struct PgLedgerStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, lock_timeout: Duration) -> Self {
        Self {
            pool,
            clock,
            lock_timeout,
        }
    }
}

fn money_column(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let value: Decimal = row.try_get(column)?;
    Money::from_decimal(value).map_err(|e| StoreError::Corrupt(format!("{}: {}", column, e)))
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: row.try_get("id")?,
        account_number: row.try_get("account_number")?,
        balance: money_column(row, "balance")?,
        owner_id: row.try_get("owner_id")?,
    })
}

fn row_to_record(row: &PgRow) -> Result<TransactionRecord, StoreError> {
    let kind: String = row.try_get("type")?;
    Ok(TransactionRecord {
        id: row.try_get("id")?,
        amount: money_column(row, "amount")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        kind: kind
            .parse::<TransactionType>()
            .map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_idempotency(row: &PgRow) -> Result<IdempotencyRecord, StoreError> {
    Ok(IdempotencyRecord {
        key: row.try_get("key")?,
        transaction_id: row.try_get("transaction_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let mut tx = self.pool.begin().await?;
        // SET cannot take bind parameters; the value is an integer we format
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis().max(1)
        ))
        .execute(&mut *tx)
        .await?;

        Ok(Box::new(PgLedgerTx {
            tx,
            clock: self.clock.clone(),
        }))
    }

    async fn find_idempotency_record(
        &self,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT key, transaction_id, created_at FROM idempotency_records WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_idempotency).transpose()
    }

    async fn owned_account_ids(&self, owner_id: UserId) -> Result<Vec<AccountId>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM accounts WHERE owner_id = $1 ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn query_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<(Vec<HistoryEntry>, u64), StoreError> {
        let owned = query.owned_account_ids().to_vec();
        let kind = query.kind().map(|k| k.as_str());
        let account_number = query.account_number();

        // Count and page from one snapshot
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {}", HISTORY_FILTER))
            .bind(owned.as_slice())
            .bind(kind)
            .bind(account_number)
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT t.id, t.amount, t.from_account_id, t.to_account_id, t.type, t.created_at,
                   fa.account_number AS from_account_number,
                   ta.account_number AS to_account_number
            {}
            ORDER BY t.created_at DESC, t.id DESC
            OFFSET $4 LIMIT $5
            "#,
            HISTORY_FILTER
        ))
        .bind(owned.as_slice())
        .bind(kind)
        .bind(account_number)
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .bind(i64::from(query.limit()))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let entries = rows
            .iter()
            .map(|row| -> Result<HistoryEntry, StoreError> {
                Ok(HistoryEntry {
                    record: row_to_record(row)?,
                    from_account_number: row.try_get("from_account_number")?,
                    to_account_number: row.try_get("to_account_number")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok((entries, u64::try_from(count).unwrap_or(0)))
    }
}

/// One database transaction
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
    clock: Arc<dyn Clock>,
}

impl PgLedgerTx {
    async fn apply_delta(&mut self, sql: &str, id: AccountId, amount: Money) -> Result<(), StoreError> {
        let result = sqlx::query(sql)
            .bind(amount.as_decimal())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(format!("account {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<TransactionId>, StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut *self.tx)
            .await?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT transaction_id FROM idempotency_records WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await?;

        debug!(key, hit = existing.is_some(), "Idempotency slot locked");
        Ok(existing)
    }

    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_number, balance, owner_id
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT id, account_number, balance, owner_id FROM accounts WHERE account_number = $1",
        )
        .bind(account_number)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn debit(&mut self, id: AccountId, amount: Money) -> Result<(), StoreError> {
        self.apply_delta(
            "UPDATE accounts SET balance = balance - $1 WHERE id = $2",
            id,
            amount,
        )
        .await
    }

    async fn credit(&mut self, id: AccountId, amount: Money) -> Result<(), StoreError> {
        self.apply_delta(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2",
            id,
            amount,
        )
        .await
    }

    async fn insert_transaction(
        &mut self,
        new: NewTransaction,
    ) -> Result<TransactionRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transaction_records (amount, from_account_id, to_account_id, type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, amount, from_account_id, to_account_id, type, created_at
            "#,
        )
        .bind(new.amount.as_decimal())
        .bind(new.from_account_id)
        .bind(new.to_account_id)
        .bind(new.kind.as_str())
        .bind(self.clock.now())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_record(&row)
    }

    async fn insert_idempotency_record(
        &mut self,
        key: &str,
        transaction_id: TransactionId,
    ) -> Result<IdempotencyRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO idempotency_records (key, transaction_id, created_at)
            VALUES ($1, $2, $3)
            RETURNING key, transaction_id, created_at
            "#,
        )
        .bind(key)
        .bind(transaction_id)
        .bind(self.clock.now())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_idempotency(&row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
