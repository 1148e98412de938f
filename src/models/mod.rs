//! Data models representing database entities.

/// Ledger account model
pub mod account;
/// Cached responses for retried requests
pub mod idempotency;
/// Authorization / capture / void / refund records
pub mod transaction;
