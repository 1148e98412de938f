//! Application configuration management.
//!
//! Configuration comes from environment variables, deserialized with `envy`
//! and range-checked before anything is built from it.

use std::time::Duration;

use serde::Deserialize;

/// Longest idempotency retention accepted (ten years).
pub const MAX_RETENTION_HOURS: u32 = 24 * 365 * 10;

/// Longest interval between two idempotency sweeps (one week).
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `DATABASE_ACQUIRE_TIMEOUT_SECS` (optional): defaults to 5
/// - `DATABASE_MAX_LIFETIME_SECS` (optional): connection recycle age, defaults to 1800
/// - `DATABASE_IDLE_TIMEOUT_SECS` (optional): idle connection close, defaults to 600
/// - `IDEMPOTENCY_RETENTION_HOURS` (optional): defaults to 24
/// - `IDEMPOTENCY_SWEEP_INTERVAL_SECS` (optional): defaults to 3600
/// - `SHUTDOWN_TIMEOUT_SECS` (optional): graceful shutdown deadline, defaults to 30
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub database_acquire_timeout_secs: u64,

    #[serde(default = "default_max_lifetime_secs")]
    pub database_max_lifetime_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub database_idle_timeout_secs: u64,

    #[serde(default = "default_retention_hours")]
    pub idempotency_retention_hours: u32,

    #[serde(default = "default_sweep_interval_secs")]
    pub idempotency_sweep_interval_secs: u64,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_max_lifetime_secs() -> u64 {
    30 * 60
}

fn default_idle_timeout_secs() -> u64 {
    10 * 60
}

fn default_retention_hours() -> u32 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn check_range(name: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, a value cannot be
    /// parsed into its expected type, or a value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build a validated configuration from explicit `(NAME, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall the pool or break the sweep.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "DATABASE_MAX_CONNECTIONS",
            u64::from(self.database_max_connections),
            1,
            u64::from(u32::MAX),
        )?;
        check_range(
            "DATABASE_ACQUIRE_TIMEOUT_SECS",
            self.database_acquire_timeout_secs,
            1,
            3600,
        )?;
        check_range(
            "IDEMPOTENCY_RETENTION_HOURS",
            u64::from(self.idempotency_retention_hours),
            1,
            u64::from(MAX_RETENTION_HOURS),
        )?;
        check_range(
            "IDEMPOTENCY_SWEEP_INTERVAL_SECS",
            self.idempotency_sweep_interval_secs,
            1,
            MAX_SWEEP_INTERVAL_SECS,
        )?;
        check_range("SHUTDOWN_TIMEOUT_SECS", self.shutdown_timeout_secs, 1, 3600)?;
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database_acquire_timeout_secs)
    }

    /// `None` disables recycling (value `0`).
    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.database_max_lifetime_secs > 0)
            .then(|| Duration::from_secs(self.database_max_lifetime_secs))
    }

    /// `None` keeps idle connections open (value `0`).
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.database_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.database_idle_timeout_secs))
    }

    /// How long an idempotency record is honoured before the sweep removes it.
    pub fn idempotency_retention(&self) -> chrono::Duration {
        chrono::Duration::try_hours(i64::from(self.idempotency_retention_hours))
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn idempotency_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.idempotency_sweep_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
