//! Bank API - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Purge expired idempotency keys, then keep purging on an interval
//! 5. Serve HTTP until SIGINT/SIGTERM, then drain in-flight requests for at
//!    most `SHUTDOWN_TIMEOUT_SECS`

use bank_ledger::{
    config::Config,
    db::{self, Database},
    handlers,
    maintenance::IdempotencySweeper,
};
use std::future::IntoFuture;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(port = config.server_port, "starting bank api");

    let pool = db::create_pool(&config).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let database = Database::new(pool, tracing::info_span!("db"));

    let sweeper = IdempotencySweeper::new(
        database.clone(),
        config.idempotency_retention(),
        config.idempotency_sweep_interval(),
    )?;
    tracing::info!("cleaning up old idempotency keys");
    if let Err(e) = sweeper.sweep_once().await {
        tracing::warn!(error = %e, "failed to cleanup old idempotency keys");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = sweeper.spawn(shutdown_rx.clone());

    let app = handlers::router(database.clone());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // The sender lives inside the server future, so the sweeper also stops
    // if the server exits on its own.
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutting down server...");
            let _ = shutdown_tx.send(true);
        })
        .into_future();

    let shutdown_timeout = config.shutdown_timeout();
    let mut stopping = shutdown_rx;
    let deadline = async move {
        if stopping.wait_for(|stop| *stop).await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
        }
    }

    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "idempotency sweeper task failed");
    }

    database.close().await;
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
