//! Uniform query execution over a pool or an open transaction.

use sqlx::{
    FromRow,
    postgres::{PgArguments, PgRow},
    query::{Query, QueryAs},
};
use tracing::Span;

use super::{Database, DbTx};
use crate::error::StoreError;

pub type PgQuery<'q> = Query<'q, sqlx::Postgres, PgArguments>;
pub type PgQueryAs<'q, O> = QueryAs<'q, sqlx::Postgres, O, PgArguments>;

/// Where a repository's statements run.
///
/// The same repository code composes inside or outside a transaction; the
/// caller picks the variant when it builds the repository:
///
/// ```ignore
/// let tx = db.begin().await?;
/// let accounts = AccountRepository::new(tx.executor());
/// let transactions = TransactionRepository::new(tx.executor());
/// // ... both run in one atomic unit ...
/// tx.commit().await?;
/// ```
///
/// Every method takes an `operation` label that ends up in errors and logs.
#[derive(Clone)]
pub enum Executor {
    /// Each statement checks out its own pooled connection and autocommits.
    Pool(Database),
    /// Statements run inside a shared open transaction.
    Tx(DbTx),
}

impl Executor {
    pub fn span(&self) -> &Span {
        match self {
            Executor::Pool(db) => db.span(),
            Executor::Tx(tx) => tx.span(),
        }
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self, Executor::Tx(_))
    }

    /// Run a mutating statement and return the number of rows it affected.
    pub async fn execute(
        &self,
        operation: &'static str,
        query: PgQuery<'_>,
    ) -> Result<u64, StoreError> {
        let result = match self {
            Executor::Pool(db) => query.execute(db.pool()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.inner.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionFinalized)?;
                query.execute(&mut **conn).await
            }
        };

        result
            .map(|done| done.rows_affected())
            .map_err(|e| StoreError::from_sqlx(operation, e))
    }

    /// Run a query and collect every row.
    pub async fn fetch_all<O>(
        &self,
        operation: &'static str,
        query: PgQueryAs<'_, O>,
    ) -> Result<Vec<O>, StoreError>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let result = match self {
            Executor::Pool(db) => query.fetch_all(db.pool()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.inner.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionFinalized)?;
                query.fetch_all(&mut **conn).await
            }
        };

        result.map_err(|e| StoreError::from_sqlx(operation, e))
    }

    /// Run a query expected to return at most one row.
    pub async fn fetch_optional<O>(
        &self,
        operation: &'static str,
        query: PgQueryAs<'_, O>,
    ) -> Result<Option<O>, StoreError>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let result = match self {
            Executor::Pool(db) => query.fetch_optional(db.pool()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.inner.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionFinalized)?;
                query.fetch_optional(&mut **conn).await
            }
        };

        result.map_err(|e| StoreError::from_sqlx(operation, e))
    }
}
