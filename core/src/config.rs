use std::env;
use std::path::PathBuf;

use crate::dialect::Dialect;

/// Runtime configuration, loaded from environment variables.
///
/// Mirrors the original's flat `GlobalConfig` (`settings.py`): one
/// environment-backed struct rather than a layered framework, since the
/// workspace has no web framework pulling in its own settings machinery.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub intake_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub duplicates_dir: PathBuf,
    pub batch_size: usize,
    pub log_level: String,
    pub worker_count: usize,
    pub owner_webhook_url: Option<String>,
    pub operator_webhook_url: Option<String>,
}

/// Raised when a required environment variable is missing or cannot be
/// parsed into the expected type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),

    #[error("environment variable {name} has an invalid value: {value}")]
    Invalid { name: String, value: String },
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// Required: `DATABASE_URL`, `INTAKE_DIR`, `ARCHIVE_DIR`,
    /// `DUPLICATES_DIR`. Optional, with the original's defaults:
    /// `BATCH_SIZE` (10,000), `LOG_LEVEL` ("info"), `WORKER_COUNT`
    /// (number of CPUs).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            database_url: required("DATABASE_URL")?,
            intake_dir: PathBuf::from(required("INTAKE_DIR")?),
            archive_dir: PathBuf::from(required("ARCHIVE_DIR")?),
            duplicates_dir: PathBuf::from(required("DUPLICATES_DIR")?),
            batch_size: optional_parsed("BATCH_SIZE", 10_000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            worker_count: optional_parsed("WORKER_COUNT", num_cpus())?,
            owner_webhook_url: env::var("OWNER_WEBHOOK_URL").ok(),
            operator_webhook_url: env::var("OPERATOR_WEBHOOK_URL").ok(),
        })
    }

    /// Infers the SQL dialect from the scheme of `database_url`, the way
    /// `sqlx::AnyPool` itself dispatches on connection-string scheme.
    pub fn dialect(&self) -> Option<Dialect> {
        if self.database_url.starts_with("postgres") {
            Some(Dialect::Postgres)
        } else if self.database_url.starts_with("mysql") {
            Some(Dialect::MySql)
        } else if self.database_url.starts_with("sqlite") {
            Some(Dialect::Sqlite)
        } else if self.database_url.starts_with("mssql") || self.database_url.starts_with("sqlserver") {
            Some(Dialect::SqlServer)
        } else {
            None
        }
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn optional_parsed(name: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name: name.to_string(), value }),
        Err(_) => Ok(default),
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
