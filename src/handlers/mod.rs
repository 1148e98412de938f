//! HTTP request handlers.
//!
//! The ledger core is driven by an orchestrator, not by routes; the HTTP
//! surface here only reports service identity and health.

pub mod health;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::db::Database;

/// Build the application router.
pub fn router(db: Database) -> Router {
    Router::new()
        .route("/", get(health::welcome))
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}
