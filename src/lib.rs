//! Bank Ledger - exactly-once account transfers
//!
//! Moves money between accounts under concurrent, possibly retried requests
//! and serves a paginated, authorization-scoped transaction history.
//!
//! # Modules
//!
//! - [`core_types`] - Id aliases and the clock port
//! - [`money`] - Fixed-scale decimal amounts
//! - [`store`] - Ledger persistence port (PostgreSQL and in-memory)
//! - [`transfer`] - Idempotency guard and transfer coordinator
//! - [`history`] - Transaction history queries
//! - [`gateway`] - HTTP API (axum)
//! - [`config`] / [`logging`] / [`db`] - Service wiring

// Core types - must be first!
pub mod core_types;
pub mod money;

// Ledger
pub mod history;
pub mod store;
pub mod transfer;

// Service
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Clock, FixedClock, SystemClock, TransactionId, UserId};
pub use history::{HistoryFilter, HistoryPage, HistoryService};
pub use money::{Money, MoneyError};
pub use store::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore, StoreError};
pub use transfer::{
    IdempotencyKey, TransferCoordinator, TransferError, TransferReceipt, TransferRequest,
};
