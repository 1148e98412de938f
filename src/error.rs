//! Error types for the ledger core and their HTTP mapping.
//!
//! `StoreError` is what every repository and the execution context return.
//! Each variant is a distinct, machine-checkable outcome; "absent" results
//! (no idempotency record yet, no capture for this authorization yet) are
//! `Ok(None)` and never show up here.
//!
//! `AppError` is the HTTP-facing wrapper used by the handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// SQLSTATE class for data exceptions (numeric overflow, invalid text
/// representation and the like).
const DATA_EXCEPTION_CLASS: &str = "22";

/// Errors produced by the data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A lookup or update by identity matched no row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation on insert.
    #[error("{operation}: a conflicting record already exists")]
    Conflict {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// CHECK or foreign-key constraint rejected the statement, or the
    /// values themselves were out of range for their column (SQLSTATE
    /// class 22, e.g. a balance adjustment overflowing `BIGINT`).
    #[error("{operation}: constraint violated")]
    ConstraintViolation {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Record failed validation before it reached the database.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// Metadata could not be encoded for storage or decoded on read.
    #[error("metadata encoding failed: {0}")]
    Metadata(#[from] serde_json::Error),

    /// A text column held a value that maps to no known enum variant.
    #[error("unknown {kind} value {value:?}")]
    UnknownValue { kind: &'static str, value: String },

    /// The transaction handle was already committed or rolled back.
    #[error("transaction already finalized")]
    TransactionFinalized,

    /// Connection, timeout or any other storage failure.
    #[error("{operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify a sqlx error raised while running `operation`.
    pub fn from_sqlx(operation: &'static str, source: sqlx::Error) -> Self {
        let (unique, constraint) = match source.as_database_error() {
            Some(db) => (
                db.is_unique_violation(),
                db.is_check_violation()
                    || db.is_foreign_key_violation()
                    || db.code().is_some_and(|code| code.starts_with(DATA_EXCEPTION_CLASS)),
            ),
            None => (false, false),
        };

        if unique {
            StoreError::Conflict { operation, source }
        } else if constraint {
            StoreError::ConstraintViolation { operation, source }
        } else {
            StoreError::Database { operation, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Application-wide error type for HTTP handlers.
///
/// # Status Code Mapping
///
/// - `NotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - `Invalid`, `ConstraintViolation`, `Metadata` → 422 Unprocessable Entity
/// - Everything else → 500 Internal Server Error (hides details from client)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Store(err @ StoreError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            AppError::Store(err @ StoreError::Conflict { .. }) => {
                (StatusCode::CONFLICT, "conflict", err.to_string())
            }
            AppError::Store(
                err @ (StoreError::Invalid(_)
                | StoreError::ConstraintViolation { .. }
                | StoreError::Metadata(_)),
            ) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request",
                err.to_string(),
            ),
            AppError::Store(_) | AppError::Database(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_classify_as_storage_failures() {
        let err = StoreError::from_sqlx("adjust balances", sqlx::Error::PoolTimedOut);
        assert!(matches!(
            err,
            StoreError::Database {
                operation: "adjust balances",
                ..
            }
        ));
        assert!(err.to_string().starts_with("adjust balances failed"));
    }

    #[test]
    fn not_found_names_the_entity_and_id() {
        let err = StoreError::not_found("account", "4111111111111111");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "account not found: 4111111111111111");
    }

    #[test]
    fn store_errors_map_to_distinct_statuses() {
        let not_found = AppError::from(StoreError::not_found("transaction", "x")).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = AppError::from(StoreError::Invalid("amount".into())).into_response();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let finalized = AppError::from(StoreError::TransactionFinalized).into_response();
        assert_eq!(finalized.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let db = AppError::from(sqlx::Error::PoolClosed).into_response();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
