//! Database connection pool, migrations and transaction handles.
//!
//! - `create_pool` / `run_migrations` bootstrap PostgreSQL
//! - `Database` is the pooled execution context
//! - `DbTx` is an open transaction that several repositories can share
//!
//! Repositories never see either type directly; they are built on an
//! [`Executor`], which wraps one or the other.

mod executor;

pub use executor::{Executor, PgQuery, PgQueryAs};

use std::sync::Arc;

use sqlx::{Pool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::Span;

use crate::{config::Config, error::StoreError};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// The pool is sized from `DATABASE_MAX_CONNECTIONS`, recycles connections
/// per `DATABASE_MAX_LIFETIME_SECS` / `DATABASE_IDLE_TIMEOUT_SECS`, and a connection is
/// opened immediately, so a bad URL or unreachable server fails here rather
/// than on the first request.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(config: &Config) -> Result<DbPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.database_max_connections,
        acquire_timeout_secs = config.database_acquire_timeout_secs,
        max_lifetime_secs = config.database_max_lifetime_secs,
        idle_timeout_secs = config.database_idle_timeout_secs,
        "connecting to database"
    );

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.acquire_timeout())
        .max_lifetime(config.max_lifetime())
        .idle_timeout(config.idle_timeout())
        .connect(&config.database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each one runs only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Pooled execution context.
///
/// Cloning is cheap; every clone shares the same pool and log span.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    span: Span,
}

impl Database {
    pub fn new(pool: DbPool, span: Span) -> Self {
        Self { pool, span }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Executor that runs each statement on its own pooled connection.
    pub fn executor(&self) -> Executor {
        Executor::Pool(self.clone())
    }

    /// Start a new transaction.
    ///
    /// Uses the server's default isolation level (READ COMMITTED on
    /// PostgreSQL); serialization of balance changes comes from row locks.
    pub async fn begin(&self) -> Result<DbTx, StoreError> {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!(parent: &self.span, error = %e, "failed to begin transaction");
            StoreError::from_sqlx("begin transaction", e)
        })?;

        tracing::debug!(parent: &self.span, "transaction started");
        Ok(DbTx {
            inner: Arc::new(Mutex::new(Some(tx))),
            span: self.span.clone(),
        })
    }

    pub async fn close(&self) {
        tracing::info!(parent: &self.span, "closing database connection");
        self.pool.close().await;
    }
}

/// Handle to an open database transaction.
///
/// Clones share the same underlying transaction, so an account repository
/// and a transaction repository built from the same `DbTx` take part in one
/// atomic unit. Once every handle is dropped without `commit`, sqlx rolls the
/// transaction back; a cancelled request therefore leaves nothing behind.
#[derive(Clone)]
pub struct DbTx {
    inner: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
    span: Span,
}

impl DbTx {
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Executor that runs statements inside this transaction.
    pub fn executor(&self) -> Executor {
        Executor::Tx(self.clone())
    }

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// - `TransactionFinalized` if it was already committed or rolled back
    /// - `Database` if the commit itself fails
    pub async fn commit(&self) -> Result<(), StoreError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(StoreError::TransactionFinalized)?;

        tx.commit().await.map_err(|e| {
            tracing::error!(parent: &self.span, error = %e, "failed to commit transaction");
            StoreError::from_sqlx("commit transaction", e)
        })?;

        tracing::debug!(parent: &self.span, "transaction committed");
        Ok(())
    }

    /// Roll the transaction back.
    ///
    /// Rolling back an already committed or rolled back transaction is a
    /// no-op, so this is safe to call on every error path.
    pub async fn rollback(&self) -> Result<(), StoreError> {
        let Some(tx) = self.inner.lock().await.take() else {
            tracing::debug!(parent: &self.span, "transaction already closed, ignoring rollback");
            return Ok(());
        };

        tx.rollback().await.map_err(|e| {
            tracing::error!(parent: &self.span, error = %e, "failed to rollback transaction");
            StoreError::from_sqlx("rollback transaction", e)
        })?;

        tracing::debug!(parent: &self.span, "transaction rolled back");
        Ok(())
    }

    pub async fn is_finalized(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}
