//! Core types used throughout the system
//!
//! These are fundamental type aliases and the clock port used by all modules.
//! Identifiers are `i64` because they map one-to-one onto PostgreSQL
//! `BIGINT` / `BIGSERIAL` columns.

use chrono::{DateTime, Utc};

/// Account ID - assigned by account provisioning, immutable.
pub type AccountId = i64;

/// User ID - owner of accounts, supplied by the identity layer.
///
/// The ledger never creates users; it only trusts an already verified id.
pub type UserId = i64;

/// Transaction record ID - assigned by the store on insert, monotonic.
pub type TransactionId = i64;

/// Wall-clock source for record timestamps.
///
/// Injected into stores so tests can control `created_at` ordering.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant (tests, deterministic replays).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
