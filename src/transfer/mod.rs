//! Transfer Engine
//!
//! Moves money between two accounts exactly once per idempotency key.
//!
//! # Components
//!
//! - [`IdempotencyGuard`]: key-slot lock plus lookup, inside the unit
//! - [`TransferCoordinator`]: the nine-step atomic unit
//!
//! # Safety Invariants
//!
//! 1. **Conservation**: a committed transfer leaves `sender + receiver` unchanged
//! 2. **Exactly once**: one transaction record and one idempotency record per key
//! 3. **No lost updates**: sender row lock, relative receiver credit
//! 4. **All or nothing**: every failure rolls back the whole unit

pub mod coordinator;
pub mod error;
pub mod idempotency;
pub mod types;

// Re-exports for convenience
pub use coordinator::TransferCoordinator;
pub use error::TransferError;
pub use idempotency::{GuardOutcome, IdempotencyGuard};
pub use types::{IdempotencyKey, TransferReceipt, TransferRequest};
