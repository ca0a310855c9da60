use sqlx::{AnyPool, Column, Row};

use core::dialect::Dialect;
use core::error::EtlError;
use core::retry::RetryPolicy;
use core::source_spec::SourceSpec;

/// Bound on how many duplicate grain tuples are sampled into a
/// `GrainValidation` error's detail (spec.md §4.5.1: "query a bounded
/// sample of duplicate grain tuples").
const GRAIN_SAMPLE_LIMIT: i64 = 5;

/// Runs the grain-uniqueness check and, if `spec` declares one, the
/// source's custom `audit_query` against its staging table. The
/// grain-uniqueness check is its own error kind (`GrainValidation`), not
/// folded into `AuditFailed` - spec.md §7's error taxonomy keeps the two
/// distinct, and scenario 4 (§8) expects the sample to read
/// `transaction_id: TXN001, duplicate_count: 2` in alias form. The
/// declarative `audit_sql` check is expressed as a query that returns
/// named `0`/`1` columns - a `1` means the check passed - mirroring the
/// original's `_audit_data`.
pub async fn audit_stage_table(pool: &AnyPool, spec: &SourceSpec, stage_table: &str, filename: &str) -> Result<(), EtlError> {
    let retry = RetryPolicy::default();

    let grain_cols = spec.grain().join(", ");
    let grain_query = format!(
        "SELECT CASE WHEN COUNT(*) = COUNT(DISTINCT {grain_cols}) THEN 1 ELSE 0 END AS grain_unique FROM {stage_table}"
    );

    let grain_ok: i64 = retry
        .run(|| async { run_audit_query(pool, &grain_query, "grain_unique").await })
        .await?;

    if grain_ok != 1 {
        let samples = retry.run(|| async { grain_duplicate_samples(pool, spec, stage_table).await }).await?;
        return Err(EtlError::GrainValidation {
            filename: filename.to_string(),
            grain: spec.grain().to_vec(),
            detail: samples.join("; "),
        });
    }

    if let Some(custom_query) = spec.audit_query() {
        let rendered = custom_query.replace("{table}", stage_table);
        let failing = retry.run(|| async { run_custom_audit(pool, &rendered).await }).await?;

        if !failing.is_empty() {
            return Err(EtlError::AuditFailed {
                filename: filename.to_string(),
                audit_name: spec.name().to_string(),
                detail: format!("failing audit column(s): {}", failing.join(", ")),
            });
        }
    }

    Ok(())
}

async fn run_audit_query(pool: &AnyPool, sql: &str, column: &str) -> Result<i64, EtlError> {
    let row = sqlx::query(sql)
        .fetch_one(pool)
        .await
        .map_err(|source| EtlError::Database { operation: format!("audit.{column}"), source })?;

    row.try_get::<i64, _>(column)
        .map_err(|source| EtlError::Database { operation: format!("audit.{column}.parse_result"), source })
}

/// Runs a source's declarative `audit_sql` and returns the name of every
/// column whose value is `0` (spec.md §4.5.2: "the result must be a
/// single row whose every column is 0 or 1. Any 0 names a failed audit;
/// raise AuditFailed listing all failing audit column names") - unlike
/// the grain check, a custom audit query may assert several conditions
/// at once, one per column.
async fn run_custom_audit(pool: &AnyPool, sql: &str) -> Result<Vec<String>, EtlError> {
    let row = sqlx::query(sql)
        .fetch_one(pool)
        .await
        .map_err(|source| EtlError::Database { operation: "audit.custom".to_string(), source })?;

    let mut failing = Vec::new();
    for column in row.columns() {
        let value: i64 = row
            .try_get(column.ordinal())
            .map_err(|source| EtlError::Database { operation: "audit.custom.parse_result".to_string(), source })?;
        if value != 1 {
            failing.push(column.name().to_string());
        }
    }
    Ok(failing)
}

/// Queries a bounded sample of duplicate grain tuples (spec.md §4.5.1)
/// and renders each as `alias: value, ...` plus its `duplicate_count`,
/// matching scenario 4's expected `transaction_id: TXN001,
/// duplicate_count: 2`.
async fn grain_duplicate_samples(pool: &AnyPool, spec: &SourceSpec, stage_table: &str) -> Result<Vec<String>, EtlError> {
    let grain_cols = spec.grain().join(", ");
    let sql = match spec.dialect() {
        Dialect::SqlServer => format!(
            "SELECT TOP {GRAIN_SAMPLE_LIMIT} {grain_cols}, COUNT(*) AS duplicate_count FROM {stage_table} \
             GROUP BY {grain_cols} HAVING COUNT(*) > 1"
        ),
        _ => format!(
            "SELECT {grain_cols}, COUNT(*) AS duplicate_count FROM {stage_table} \
             GROUP BY {grain_cols} HAVING COUNT(*) > 1 LIMIT {GRAIN_SAMPLE_LIMIT}"
        ),
    };

    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|source| EtlError::Database { operation: "audit.grain_duplicates".to_string(), source })?;

    let mut samples = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut parts: Vec<String> = spec
            .grain()
            .iter()
            .map(|name| {
                let alias = spec.fields().iter().find(|f| f.name() == name).map(|f| f.alias()).unwrap_or(name.as_str());
                format!("{alias}: {}", grain_cell_as_string(row, name))
            })
            .collect();
        let count: i64 = row.try_get("duplicate_count").unwrap_or_default();
        parts.push(format!("duplicate_count: {count}"));
        samples.push(parts.join(", "));
    }
    Ok(samples)
}

/// Reads one grain column's value as a display string without needing to
/// know its declared semantic type up front - tries the column decodings
/// an `AnyRow` actually supports, in the order a grain value is likely to
/// arrive (most grains are string or integer identifiers).
fn grain_cell_as_string(row: &sqlx::any::AnyRow, column: &str) -> String {
    if let Ok(v) = row.try_get::<String, _>(column) {
        return v;
    }
    if let Ok(v) = row.try_get::<i64, _>(column) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<f64, _>(column) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<bool, _>(column) {
        return v.to_string();
    }
    "?".to_string()
}
