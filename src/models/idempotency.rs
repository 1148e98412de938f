//! Idempotency record model.
//!
//! A record caches the response of a mutating request so that a retry with
//! the same key against the same operation replays it instead of repeating
//! the side effect.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cached response stored in the `idempotency_keys` table.
///
/// `(key, request_path)` is the primary key; the first insert for a pair is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct IdempotencyRecord {
    /// Caller-supplied token
    pub key: String,

    /// Logical operation the key is scoped to (e.g. `/api/v1/authorizations`)
    pub request_path: String,

    pub response_status: i32,

    pub response_body: Vec<u8>,

    pub created_at: DateTime<Utc>,
}

/// Insert payload for `IdempotencyRepository::store`.
#[derive(Debug, Clone)]
pub struct NewIdempotencyRecord {
    pub key: String,
    pub request_path: String,
    pub response_status: i32,
    pub response_body: Vec<u8>,
    /// Defaults to the database's `NOW()` when absent.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewIdempotencyRecord {
    pub fn new(
        key: impl Into<String>,
        request_path: impl Into<String>,
        response_status: i32,
        response_body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key: key.into(),
            request_path: request_path.into(),
            response_status,
            response_body: response_body.into(),
            created_at: None,
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}
