//! HTTP handlers

pub mod health;
pub mod history;
pub mod transfer;

pub use health::{HealthResponse, health_check};
pub use history::{HistoryParams, get_history};
pub use transfer::{IDEMPOTENCY_KEY_HEADER, TransferBody, create_transfer};
