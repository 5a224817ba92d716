//! Transaction History
//!
//! Paginated, filtered view of the ledger, scoped to the accounts a user owns.
//! Reads a single snapshot and takes no locks.

pub mod error;
pub mod service;
pub mod types;

pub use error::HistoryError;
pub use service::HistoryService;
pub use types::{HistoryFilter, HistoryPage, DEFAULT_LIMIT, DEFAULT_PAGE};
