//! Bank ledger core.
//!
//! The transactional data layer of a mock bank: an account ledger with
//! locked reads and atomic balance adjustment, a store for authorization /
//! capture / void / refund records, and an idempotency cache for retried
//! requests. All of it runs over an [`db::Executor`], so an orchestrator can
//! compose several repository calls into one database transaction.
//!
//! # Architecture
//!
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Concurrency**: `SELECT ... FOR UPDATE` row locks plus delta `UPDATE`s
//! - **Idempotency**: `INSERT ... ON CONFLICT DO NOTHING`, first writer wins
//! - **Maintenance**: recurring purge of expired idempotency records

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod maintenance;
pub mod models;
pub mod repositories;

pub use config::{Config, ConfigError};
pub use db::{Database, DbTx, Executor};
pub use error::{AppError, StoreError};
