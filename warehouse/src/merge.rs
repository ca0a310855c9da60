use sqlx::{AnyPool, Row};

use core::error::EtlError;
use core::retry::RetryPolicy;
use core::source_spec::SourceSpec;

/// How many stage rows will insert versus update once merged, computed
/// *before* the merge runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeCounts {
    pub inserts: i64,
    pub updates: i64,
}

/// Merges a file's staging table into its target table and reports how
/// many rows were inserted versus updated.
///
/// Grounded on `original_source/src/file_processor.py`'s
/// `_merge_stage_to_target`: `target_inserts`/`target_updates` are
/// computed via two separate `EXISTS`/`COUNT` queries *before* the merge
/// statement runs (rather than parsed back out of the merge's own
/// affected-row count, which SQL engines report inconsistently across
/// dialects for "matched but unchanged" rows), then the dialect-specific
/// upsert from `core::dialect::Dialect::render_upsert` is executed.
pub async fn merge_stage_into_target(pool: &AnyPool, spec: &SourceSpec, stage_table: &str) -> Result<MergeCounts, EtlError> {
    let retry = RetryPolicy::default();
    let target = spec.table_name();
    let grain_join = spec.grain().iter().map(|g| format!("t.{g} = s.{g}")).collect::<Vec<_>>().join(" AND ");

    let insert_count_sql = format!(
        "SELECT COUNT(*) AS n FROM {stage_table} s WHERE NOT EXISTS \
         (SELECT 1 FROM {target} t WHERE {grain_join})"
    );
    let update_count_sql = format!(
        "SELECT COUNT(*) AS n FROM {stage_table} s WHERE EXISTS \
         (SELECT 1 FROM {target} t WHERE {grain_join} AND t.etl_row_hash <> s.etl_row_hash)"
    );

    let inserts = retry.run(|| async { count_rows(pool, &insert_count_sql).await }).await?;
    let updates = retry.run(|| async { count_rows(pool, &update_count_sql).await }).await?;

    let upsert_sql = spec.dialect().render_upsert(target, stage_table, spec.grain(), &spec.non_grain_columns());
    retry
        .run(|| async {
            sqlx::query(&upsert_sql)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(|source| EtlError::Database { operation: "merge.upsert".to_string(), source })
        })
        .await?;

    Ok(MergeCounts { inserts, updates })
}

async fn count_rows(pool: &AnyPool, sql: &str) -> Result<i64, EtlError> {
    let row = sqlx::query(sql)
        .fetch_one(pool)
        .await
        .map_err(|source| EtlError::Database { operation: "merge.count".to_string(), source })?;
    row.try_get::<i64, _>("n").map_err(|source| EtlError::Database { operation: "merge.count.parse".to_string(), source })
}
