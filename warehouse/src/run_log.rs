use chrono::{NaiveDateTime, Utc};
use sqlx::AnyPool;

use core::error::EtlError;
use core::retry::RetryPolicy;

/// The five phases spec.md §3's `RunLog` tracks individually - each with
/// its own `started_at`/`ended_at`/`success` triple, distinct from the
/// broader state-machine phases of `conductor::pipeline` (which also
/// passes through `REGISTERED`/`DUPLICATE`/`CLEANED`/`DONE`, none of
/// which earn their own timing columns here).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Archive,
    Processing,
    StageLoad,
    Audit,
    Merge,
}

impl RunPhase {
    fn column_prefix(&self) -> &'static str {
        match self {
            RunPhase::Archive => "archive",
            RunPhase::Processing => "processing",
            RunPhase::StageLoad => "stage_load",
            RunPhase::Audit => "audit",
            RunPhase::Merge => "merge",
        }
    }
}

/// A durable, per-file record of the pipeline's phase-by-phase outcomes
/// (spec.md §3, §4.7). One row is inserted per processing attempt
/// (`start`) and patched in place as phases begin and end; rows are
/// never deleted, matching "monotonically appended, never deleted."
///
/// Grounded on `original_source/src/file_processor.py`'s `_log_start`/
/// `_log_update` (both retryable raw-SQL operations), generalised from
/// the original's single mutable `status` column into the five named
/// phase columns spec.md §3 actually declares.
pub struct RunLog<'a> {
    pool: &'a AnyPool,
    retry: RetryPolicy,
}

impl<'a> RunLog<'a> {
    pub fn new(pool: &'a AnyPool) -> Self {
        RunLog { pool, retry: RetryPolicy::default() }
    }

    pub async fn start(&self, id: &str, filename: &str, source_name: &str) -> Result<(), EtlError> {
        let now = Utc::now().naive_utc();
        self.retry
            .run(|| async {
                sqlx::query("INSERT INTO etl_run_log (id, filename, source_name, started_at) VALUES (?, ?, ?, ?)")
                    .bind(id)
                    .bind(filename)
                    .bind(source_name)
                    .bind(now)
                    .execute(self.pool)
                    .await
                    .map(|_| ())
                    .map_err(|source| EtlError::Database { operation: "run_log.start".to_string(), source })
            })
            .await
    }

    /// Stamps `{phase}_started_at` as this phase begins.
    pub async fn phase_start(&self, id: &str, phase: RunPhase) -> Result<(), EtlError> {
        let now = Utc::now().naive_utc();
        let sql = format!("UPDATE etl_run_log SET {}_started_at = ? WHERE id = ?", phase.column_prefix());
        self.retry
            .run(|| async {
                sqlx::query(&sql)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool)
                    .await
                    .map(|_| ())
                    .map_err(|source| EtlError::Database { operation: "run_log.phase_start".to_string(), source })
            })
            .await
    }

    /// Stamps `{phase}_ended_at`/`{phase}_success` as this phase ends,
    /// whichever way it ended.
    pub async fn phase_complete(&self, id: &str, phase: RunPhase, success: bool) -> Result<(), EtlError> {
        let now = Utc::now().naive_utc();
        let prefix = phase.column_prefix();
        let sql = format!("UPDATE etl_run_log SET {prefix}_ended_at = ?, {prefix}_success = ? WHERE id = ?");
        self.retry
            .run(|| async {
                sqlx::query(&sql)
                    .bind(now)
                    .bind(success)
                    .bind(id)
                    .execute(self.pool)
                    .await
                    .map(|_| ())
                    .map_err(|source| EtlError::Database { operation: "run_log.phase_complete".to_string(), source })
            })
            .await
    }

    /// Marks this file's run as a recognised duplicate (spec.md §4.9.2):
    /// terminal, successful, but not merged.
    pub async fn duplicate(&self, id: &str) -> Result<(), EtlError> {
        let now = Utc::now().naive_utc();
        self.retry
            .run(|| async {
                sqlx::query(
                    "UPDATE etl_run_log SET ended_at = ?, duplicate_skipped = ?, success = ? WHERE id = ?",
                )
                .bind(now)
                .bind(true)
                .bind(true)
                .bind(id)
                .execute(self.pool)
                .await
                .map(|_| ())
                .map_err(|source| EtlError::Database { operation: "run_log.duplicate".to_string(), source })
            })
            .await
    }

    pub async fn complete(
        &self,
        id: &str,
        records_processed: i64,
        validation_errors: i64,
        records_stage_loaded: i64,
        target_inserts: i64,
        target_updates: i64,
    ) -> Result<(), EtlError> {
        let now = Utc::now().naive_utc();
        self.retry
            .run(|| async {
                sqlx::query(
                    "UPDATE etl_run_log SET ended_at = ?, success = ?, records_processed = ?, validation_errors = ?, \
                     records_stage_loaded = ?, target_inserts = ?, target_updates = ? WHERE id = ?",
                )
                .bind(now)
                .bind(true)
                .bind(records_processed)
                .bind(validation_errors)
                .bind(records_stage_loaded)
                .bind(target_inserts)
                .bind(target_updates)
                .bind(id)
                .execute(self.pool)
                .await
                .map(|_| ())
                .map_err(|source| EtlError::Database { operation: "run_log.complete".to_string(), source })
            })
            .await
    }

    pub async fn fail(&self, id: &str, error_type: &str, error_detail: &str) -> Result<(), EtlError> {
        let now: NaiveDateTime = Utc::now().naive_utc();
        self.retry
            .run(|| async {
                sqlx::query(
                    "UPDATE etl_run_log SET ended_at = ?, success = ?, error_type = ?, error_detail = ? WHERE id = ?",
                )
                .bind(now)
                .bind(false)
                .bind(error_type)
                .bind(error_detail)
                .bind(id)
                .execute(self.pool)
                .await
                .map(|_| ())
                .map_err(|source| EtlError::Database { operation: "run_log.fail".to_string(), source })
            })
            .await
    }
}
