//! Data access layer.
//!
//! Each repository is built on an [`Executor`](crate::db::Executor) and
//! holds no state besides it, so repositories are created per request (or
//! per transaction) and thrown away afterwards.

pub mod account;
pub mod idempotency;
pub mod transaction;

pub use account::AccountRepository;
pub use idempotency::IdempotencyRepository;
pub use transaction::TransactionRepository;
