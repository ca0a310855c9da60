use chrono::Utc;
use sqlx::AnyPool;

use core::dialect::Dialect;
use core::error::EtlError;
use core::retry::RetryPolicy;
use intake::FailedRecord;

use crate::schema::truncate_for_sqlserver;

/// Bound on rows removed per `DELETE` when purging stale DLQ rows, so a
/// filename with a large backlog of prior-run rejects doesn't require an
/// unbounded single statement (spec.md §4.9.7: "bounded batches").
const PURGE_BATCH_SIZE: i64 = 1_000;

/// The Dead Letter Queue: one durable row per rejected record (spec.md
/// §3's `DeadLetterRow`). Rows accumulate across a file's processing
/// attempts; `purge_stale` is the operation that enforces "only the
/// latest run's rows are retained per filename" (spec.md §4.9.7), called
/// by the File Pipeline once a reprocess merges successfully.
pub struct DeadLetterQueue<'a> {
    pool: &'a AnyPool,
    dialect: Dialect,
    retry: RetryPolicy,
}

impl<'a> DeadLetterQueue<'a> {
    pub fn new(pool: &'a AnyPool, dialect: Dialect) -> Self {
        DeadLetterQueue { pool, dialect, retry: RetryPolicy::default() }
    }

    /// Batch-inserts one file's rejected rows, matching the Staging
    /// Loader's `insert_dlq(batch)` (spec.md §4.4): one multi-row
    /// transaction per batch, retried on transient failure.
    pub async fn insert_batch(
        &self,
        filename: &str,
        target_table_name: &str,
        run_log_id: &str,
        batch: &[FailedRecord],
    ) -> Result<(), EtlError> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = Utc::now().naive_utc();
        self.retry
            .run(|| async {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|source| EtlError::Database { operation: "dlq.begin".to_string(), source })?;

                for record in batch {
                    let record_json = serde_json::to_string(&record.record)
                        .map_err(|e| EtlError::CodeDefect(anyhow::anyhow!("serializing dlq record: {e}")))?;
                    let errors_json = serde_json::to_string(
                        &record
                            .errors
                            .iter()
                            .map(|e| {
                                serde_json::json!({
                                    "column_name": e.column_alias,
                                    "column_value": e.column_value,
                                    "error_kind": e.error_kind,
                                    "error_message": e.error_message,
                                })
                            })
                            .collect::<Vec<_>>(),
                    )
                    .map_err(|e| EtlError::CodeDefect(anyhow::anyhow!("serializing dlq errors: {e}")))?;

                    let (record_json, errors_json) = if self.dialect == Dialect::SqlServer {
                        (truncate_for_sqlserver(&record_json), truncate_for_sqlserver(&errors_json))
                    } else {
                        (record_json, errors_json)
                    };

                    sqlx::query(
                        "INSERT INTO etl_dead_letter \
                         (source_filename, file_row_number, file_record_data, validation_errors, run_log_id, target_table_name, failed_at) \
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(filename)
                    .bind(record.row_number as i64)
                    .bind(record_json)
                    .bind(errors_json)
                    .bind(run_log_id)
                    .bind(target_table_name)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(|source| EtlError::Database { operation: "dlq.insert_batch".to_string(), source })?;
                }

                tx.commit().await.map_err(|source| EtlError::Database { operation: "dlq.commit".to_string(), source })
            })
            .await
    }

    /// Deletes every DLQ row for `filename` whose `run_log_id` is not
    /// `current_run_log_id`, in bounded batches - called after a
    /// successful merge so the DLQ reflects only the latest attempt.
    pub async fn purge_stale(&self, filename: &str, current_run_log_id: &str) -> Result<(), EtlError> {
        loop {
            let deleted = self
                .retry
                .run(|| async { self.purge_one_batch(filename, current_run_log_id).await })
                .await?;

            if deleted < PURGE_BATCH_SIZE {
                return Ok(());
            }
        }
    }

    async fn purge_one_batch(&self, filename: &str, current_run_log_id: &str) -> Result<i64, EtlError> {
        // SQL Server has no `LIMIT`/`FETCH` clause on a bare subquery; the
        // row cap there is expressed as `DELETE TOP (n)` instead, so this
        // dialect needs its own statement shape rather than sharing the
        // `LIMIT`-based one every other dialect supports.
        let result = if self.dialect == Dialect::SqlServer {
            sqlx::query(
                "DELETE TOP (?) FROM etl_dead_letter WHERE source_filename = ? AND run_log_id <> ?",
            )
            .bind(PURGE_BATCH_SIZE)
            .bind(filename)
            .bind(current_run_log_id)
            .execute(self.pool)
            .await
        } else {
            sqlx::query(
                "DELETE FROM etl_dead_letter WHERE id IN (\
                    SELECT id FROM etl_dead_letter WHERE source_filename = ? AND run_log_id <> ? LIMIT ?\
                )",
            )
            .bind(filename)
            .bind(current_run_log_id)
            .bind(PURGE_BATCH_SIZE)
            .execute(self.pool)
            .await
        };

        let result = result.map_err(|source| EtlError::Database { operation: "dlq.purge_stale".to_string(), source })?;
        Ok(result.rows_affected() as i64)
    }
}
