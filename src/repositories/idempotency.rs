//! Idempotency store.
//!
//! Deduplicates retried mutating requests by caching their response under
//! `(key, request_path)`. The first insert for a pair wins and later inserts
//! are silently dropped, so two concurrent first attempts cannot both become
//! authoritative. A caller whose insert lost must read the winning record
//! back instead of assuming its own response was cached; `store_or_get`
//! does both steps.

use chrono::{DateTime, Utc};
use tracing::Span;

use crate::{
    db::Executor,
    error::StoreError,
    models::idempotency::{IdempotencyRecord, NewIdempotencyRecord},
};

#[derive(Clone)]
pub struct IdempotencyRepository {
    exec: Executor,
    span: Span,
}

impl IdempotencyRepository {
    pub fn new(exec: Executor) -> Self {
        let span = tracing::debug_span!(parent: exec.span(), "idempotency");
        Self { exec, span }
    }

    /// Cached response for this exact key and path.
    ///
    /// `Ok(None)` means the request has not been seen before.
    pub async fn get(
        &self,
        key: &str,
        request_path: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let query = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT key, request_path, response_status, response_body, created_at
            FROM idempotency_keys
            WHERE key = $1 AND request_path = $2
            "#,
        )
        .bind(key)
        .bind(request_path);

        self.exec.fetch_optional("get idempotency key", query).await
    }

    /// Insert the record unless one already exists for its key and path.
    ///
    /// Returns `true` when this call's record became authoritative and
    /// `false` when an existing record was kept. Neither case is an error.
    pub async fn store(&self, record: &NewIdempotencyRecord) -> Result<bool, StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO idempotency_keys
                (key, request_path, response_status, response_body, created_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
            ON CONFLICT (key, request_path) DO NOTHING
            "#,
        )
        .bind(&record.key)
        .bind(&record.request_path)
        .bind(record.response_status)
        .bind(&record.response_body)
        .bind(record.created_at);

        let inserted = self.exec.execute("store idempotency key", query).await? == 1;
        if !inserted {
            tracing::debug!(
                parent: &self.span,
                key = %record.key,
                request_path = %record.request_path,
                "idempotency key already stored, keeping existing response"
            );
        }

        Ok(inserted)
    }

    /// Store the record if absent and return whichever record is authoritative.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the pair was neither inserted nor readable, which only
    ///   happens when a purge removes the winning row in between
    pub async fn store_or_get(
        &self,
        record: &NewIdempotencyRecord,
    ) -> Result<IdempotencyRecord, StoreError> {
        self.store(record).await?;

        self.get(&record.key, &record.request_path)
            .await?
            .ok_or_else(|| {
                StoreError::not_found(
                    "idempotency key",
                    format!("{} {}", record.key, record.request_path),
                )
            })
    }

    /// Delete every record created strictly before `before`.
    ///
    /// Returns the number of records removed.
    pub async fn purge(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE created_at < $1
            "#,
        )
        .bind(before);

        let removed = self.exec.execute("purge idempotency keys", query).await?;
        tracing::debug!(parent: &self.span, %before, removed, "idempotency keys purged");
        Ok(removed)
    }
}
