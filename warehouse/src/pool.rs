use std::time::Duration;

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;

use core::config::Config;
use core::error::EtlError;

/// Opens an `sqlx::AnyPool` against `config.database_url`, sized the way
/// the original sized SQLAlchemy's pool (`settings.py:get_database_config`):
/// embedded SQLite gets a single connection (it has no real concurrent
/// connection model - `check_same_thread` is SQLAlchemy-specific and has
/// no Rust analogue since `sqlx` connections aren't thread-affine); every
/// server database gets up to 20 connections with a 30s acquire timeout,
/// matching `Lowband21-ferrex`'s `PgPoolOptions` acquire-timeout choice.
pub async fn connect(config: &Config) -> Result<AnyPool, EtlError> {
    sqlx::any::install_default_drivers();

    let is_sqlite = config.database_url.starts_with("sqlite");
    let max_connections = if is_sqlite { 1 } else { 20 };

    AnyPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|source| EtlError::Database { operation: "opening connection pool".to_string(), source })
}

/// A lightweight health probe (`SELECT 1`), the Rust analogue of
/// `Lowband21-ferrex`'s `preflight_check` - cheap enough to call once at
/// startup before the directory scan begins.
pub async fn preflight(pool: &AnyPool) -> Result<(), EtlError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_: AnyRow| ())
        .map_err(|source| EtlError::Database { operation: "preflight check".to_string(), source })
}
