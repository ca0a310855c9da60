use sqlx::AnyPool;

use core::config::Config;
use core::dialect::Dialect;
use core::error::EtlError;
use core::retry::RetryPolicy;
use core::source_spec::SourceSpec;
use intake::ValidRecord;

use crate::schema::{create_stage_table_sql, drop_stage_table_sql};

const PROGRESS_LOG_INTERVAL: usize = 100_000;

/// Loads validated records into a file's ephemeral staging table as a
/// series of multi-row `INSERT ... VALUES (...), (...), ...` statements,
/// each batch sized by `Dialect::max_batch_rows` against the configured
/// `batch_size` so no dialect ever emits an oversized INSERT (SQL
/// Server's 1000-parameter ceiling is the binding case; every other
/// dialect is bounded only by the configured batch size).
///
/// Grounded on `original_source/src/file_processor.py`'s `_load_records`/
/// `_insert_batch`: batches are built then flushed as one multi-row
/// INSERT per round-trip, and the caller logs progress periodically
/// rather than per row.
pub async fn load_stage_table(
    pool: &AnyPool,
    config: &Config,
    spec: &SourceSpec,
    stage_table: &str,
    filename: &str,
    run_log_id: &str,
    records: &[ValidRecord],
) -> Result<(), EtlError> {
    let retry = RetryPolicy::default();
    let dialect = spec.dialect();

    retry
        .run(|| async { execute_create(pool, stage_table, spec, dialect).await })
        .await?;

    let column_count = spec.fields().len() + 3; // + etl_row_hash + source_filename + run_log_id
    let batch_size = dialect.max_batch_rows(column_count, config.batch_size).max(1);

    for (i, chunk) in records.chunks(batch_size).enumerate() {
        retry.run(|| async { insert_batch(pool, stage_table, spec, filename, run_log_id, chunk).await }).await?;

        let loaded = (i + 1) * batch_size;
        if loaded % PROGRESS_LOG_INTERVAL < batch_size {
            tracing::info!(filename, loaded, "staging progress");
        }
    }

    Ok(())
}

async fn execute_create(pool: &AnyPool, stage_table: &str, spec: &SourceSpec, dialect: Dialect) -> Result<(), EtlError> {
    sqlx::query(&drop_stage_table_sql(stage_table))
        .execute(pool)
        .await
        .map_err(|source| EtlError::Database { operation: "stage.drop".to_string(), source })?;

    sqlx::query(&create_stage_table_sql(stage_table, spec, dialect))
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|source| EtlError::Database { operation: "stage.create".to_string(), source })
}

async fn insert_batch(
    pool: &AnyPool,
    stage_table: &str,
    spec: &SourceSpec,
    filename: &str,
    run_log_id: &str,
    batch: &[ValidRecord],
) -> Result<(), EtlError> {
    if batch.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await.map_err(|source| EtlError::Database { operation: "stage.begin".to_string(), source })?;

    let column_names: Vec<&str> = spec.fields().iter().map(|f| f.name()).collect();
    let row_placeholder = format!("({})", std::iter::repeat("?").take(column_names.len() + 3).collect::<Vec<_>>().join(", "));
    let value_groups = std::iter::repeat(row_placeholder.as_str()).take(batch.len()).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "INSERT INTO {stage_table} ({}, etl_row_hash, source_filename, run_log_id) VALUES {value_groups}",
        column_names.join(", "),
    );

    let mut query = sqlx::query(&sql);
    for record in batch {
        for (_, value) in &record.fields {
            query = bind_value(query, value);
        }
        query = query.bind(record.row_hash.to_be_bytes().to_vec()).bind(filename).bind(run_log_id);
    }

    query.execute(&mut *tx).await.map_err(|source| EtlError::Database { operation: "stage.insert_batch".to_string(), source })?;

    tx.commit().await.map_err(|source| EtlError::Database { operation: "stage.commit".to_string(), source })
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &'q core::value::Value,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    use core::value::Value;
    match value {
        Value::String(s) => query.bind(s.as_str()),
        Value::Int(i) => query.bind(*i),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Float(f) => query.bind(*f),
        Value::Bool(b) => query.bind(*b),
        Value::Date(d) => query.bind(d.to_string()),
        Value::Datetime(dt) => query.bind(dt.to_string()),
        Value::Null => query.bind(Option::<String>::None),
    }
}
