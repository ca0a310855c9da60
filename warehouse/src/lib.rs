pub mod audit;
pub mod dlq;
pub mod merge;
pub mod pool;
pub mod run_log;
pub mod schema;
pub mod stage;

use sqlx::{AnyPool, Row};

use core::error::EtlError;
use core::retry::RetryPolicy;
use core::source_spec::SourceSpec;

pub use dlq::DeadLetterQueue;
pub use merge::MergeCounts;
pub use run_log::{RunLog, RunPhase};

/// Bootstraps the warehouse schema: a target table (+ index) per
/// `SourceSpec`, plus the shared Run Log and Dead Letter Queue tables.
/// Idempotent (`CREATE TABLE IF NOT EXISTS`), so it is safe to call on
/// every invocation of the binary rather than requiring a separate
/// migration step.
pub async fn bootstrap_schema(pool: &AnyPool, sources: &[SourceSpec]) -> Result<(), EtlError> {
    for spec in sources {
        let dialect = spec.dialect();
        sqlx::query(&schema::create_target_table_sql(spec, dialect))
            .execute(pool)
            .await
            .map_err(|source| EtlError::Database { operation: format!("bootstrap.{}", spec.table_name()), source })?;

        sqlx::query(&schema::create_target_indexes_sql(spec))
            .execute(pool)
            .await
            .map_err(|source| EtlError::Database { operation: format!("bootstrap.index.{}", spec.table_name()), source })?;
    }

    sqlx::query(&schema::create_run_log_table_sql(sources.first().map(|s| s.dialect()).unwrap_or(core::dialect::Dialect::Sqlite)))
        .execute(pool)
        .await
        .map_err(|source| EtlError::Database { operation: "bootstrap.run_log".to_string(), source })?;

    let dlq_dialect = sources.first().map(|s| s.dialect()).unwrap_or(core::dialect::Dialect::Sqlite);
    sqlx::query(&schema::create_dlq_table_sql(dlq_dialect))
        .execute(pool)
        .await
        .map_err(|source| EtlError::Database { operation: "bootstrap.dlq".to_string(), source })?;

    Ok(())
}

/// `true` if `target_table` already has a row whose `source_filename`
/// matches `filename` - the gate that routes a file to the duplicates
/// directory instead of processing.
///
/// Grounded on `original_source/src/file_processor.py`'s
/// `_check_duplicate_file`, though that function swallows its own errors
/// and returns `false` on failure; this workspace instead lets the
/// `RetryPolicy` retry the query and surfaces a genuine failure as an
/// `EtlError` rather than silently treating a DB hiccup as "not a
/// duplicate".
pub async fn is_duplicate_file(pool: &AnyPool, target_table: &str, filename: &str) -> Result<bool, EtlError> {
    let retry = RetryPolicy::default();
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {target_table} WHERE source_filename = ?) AS present");

    retry
        .run(|| async {
            let row = sqlx::query(&sql)
                .bind(filename)
                .fetch_one(pool)
                .await
                .map_err(|source| EtlError::Database { operation: "is_duplicate_file".to_string(), source })?;
            row.try_get::<bool, _>("present")
                .map_err(|source| EtlError::Database { operation: "is_duplicate_file.parse".to_string(), source })
        })
        .await
}
