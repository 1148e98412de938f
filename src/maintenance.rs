//! Background maintenance.
//!
//! Idempotency records only need to outlive the client's retry window. The
//! sweeper deletes older ones once at startup and then on a fixed interval,
//! so a long-running process does not accumulate them.

use std::time::Duration;

use chrono::Utc;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::Span;

use crate::{db::Database, error::StoreError, repositories::IdempotencyRepository};

pub struct IdempotencySweeper {
    db: Database,
    retention: chrono::Duration,
    interval: Duration,
    span: Span,
}

impl IdempotencySweeper {
    /// Fails with [`StoreError::Invalid`] for a zero interval or a negative
    /// retention, either of which would break the recurring sweep.
    pub fn new(
        db: Database,
        retention: chrono::Duration,
        interval: Duration,
    ) -> Result<Self, StoreError> {
        if interval.is_zero() {
            return Err(StoreError::Invalid(
                "idempotency sweep interval must be positive".to_string(),
            ));
        }
        if retention < chrono::Duration::zero() {
            return Err(StoreError::Invalid(format!(
                "idempotency retention must not be negative, got {retention}"
            )));
        }

        let span = tracing::info_span!(parent: db.span(), "idempotency_sweeper");
        Ok(Self {
            db,
            retention,
            interval,
            span,
        })
    }

    /// Purge every idempotency record older than the retention window.
    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        let cutoff = Utc::now().checked_sub_signed(self.retention).ok_or_else(|| {
            StoreError::Invalid(format!("retention {} reaches before year 1", self.retention))
        })?;
        let removed = IdempotencyRepository::new(self.db.executor())
            .purge(cutoff)
            .await?;

        tracing::info!(parent: &self.span, removed, %cutoff, "cleaned up old idempotency keys");
        Ok(removed)
    }

    /// Run `sweep_once` every interval until `shutdown` flips to `true` or
    /// its sender is dropped.
    ///
    /// The first sweep happens one interval after spawning; the startup
    /// sweep is the caller's job. Failures are logged and retried on the
    /// next tick.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = tokio::time::Instant::now();
            let start = now.checked_add(self.interval).unwrap_or(now);
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            tracing::warn!(
                                parent: &self.span,
                                error = %e,
                                "failed to cleanup old idempotency keys"
                            );
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!(parent: &self.span, "idempotency sweeper stopped");
        })
    }
}
