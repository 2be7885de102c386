//! Engine configuration.
//!
//! Layered, later sources winning:
//! 1. Defaults in code
//! 2. Optional `salesflow.toml` in the working directory
//! 3. Environment variables with the `SALESFLOW__` prefix, e.g.
//!    `SALESFLOW__DATABASE__URL` or `SALESFLOW__RETRY__MAX_ATTEMPTS`
//!
//! A `.env` file, if present, is loaded into the environment first.

use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// How long a transaction waits for a row lock before giving up
    pub lock_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts for an operation failing with a conflict or lock timeout
    pub max_attempts: u32,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// JSON lines when true, compact text otherwise
    pub json: bool,
}

impl EngineConfig {
    /// Load configuration from `.env`, `salesflow.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        defaults()?
            .add_source(File::with_name("salesflow").required(false))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with an inline TOML document, then the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("database.url", "postgres://localhost:5432/salesflow")?
        .set_default("database.max_connections", 10)?
        .set_default("database.lock_timeout_ms", 5000)?
        .set_default("retry.max_attempts", 2)?
        .set_default("logging.filter", "info")?
        .set_default("logging.json", true)
}

fn env_source() -> Environment {
    Environment::with_prefix("SALESFLOW")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_field() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert!(config.logging.json);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [database]
            url = "postgres://sales:secret@db/sales"
            lock_timeout_ms = 250

            [logging]
            json = false
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url, "postgres://sales:secret@db/sales");
        assert_eq!(config.database.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.database.max_connections, 10);
        assert!(!config.logging.json);
    }
}
