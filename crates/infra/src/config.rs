//! Store and engine configuration from the environment.

use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use quotedesk_offers::pricing::validate_tax_rate;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS: &str = "QUOTEDESK_DB_MAX_CONNECTIONS";
pub const ACQUIRE_TIMEOUT_SECS: &str = "QUOTEDESK_DB_ACQUIRE_TIMEOUT_SECS";
pub const DEFAULT_TAX_RATE: &str = "QUOTEDESK_DEFAULT_TAX_RATE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
}

/// Engine-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Applied when an offer is created without an explicit tax rate.
    pub default_tax_rate: Decimal,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_tax_rate: Decimal::from(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub settings: EngineSettings,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            settings: EngineSettings::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.database_url = lookup(DATABASE_URL).filter(|url| !url.trim().is_empty());

        if let Some(raw) = lookup(MAX_CONNECTIONS) {
            config.max_connections = match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => return Err(invalid(MAX_CONNECTIONS, &raw, "must be at least 1")),
                Err(e) => return Err(invalid(MAX_CONNECTIONS, &raw, e)),
            };
        }

        if let Some(raw) = lookup(ACQUIRE_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid(ACQUIRE_TIMEOUT_SECS, &raw, e))?;
            config.acquire_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(DEFAULT_TAX_RATE) {
            let rate = raw
                .trim()
                .parse::<Decimal>()
                .map_err(|e| invalid(DEFAULT_TAX_RATE, &raw, e))?;
            config.settings.default_tax_rate =
                validate_tax_rate(rate).map_err(|e| invalid(DEFAULT_TAX_RATE, &raw, e))?;
        }

        Ok(config)
    }

    /// Open a Postgres pool. Fails with [`ConfigError::MissingDatabaseUrl`]
    /// when no URL is configured.
    pub async fn connect(&self) -> Result<PgPool, ConnectError> {
        let url = self
            .database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to connect to database");
                e
            })?;

        tracing::info!(max_connections = self.max_connections, "database pool created");
        Ok(pool)
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
