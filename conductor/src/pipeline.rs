use std::future::Future;
use std::path::Path;
use std::time::Instant;

use sqlx::AnyPool;
use uuid::Uuid;

use core::config::Config;
use core::error::EtlError;
use core::fmt::formatted_duration_rate;
use core::source_spec::SourceSpec;
use intake::{validate, ValidationOutcome, ValidationTally};
use warehouse::{DeadLetterQueue, RunLog, RunPhase};

use crate::folders;
use crate::notify::{self, NotifyOwner};

fn phase_name(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Archive => "archive",
        RunPhase::Processing => "processing",
        RunPhase::StageLoad => "stage_load",
        RunPhase::Audit => "audit",
        RunPhase::Merge => "merge",
    }
}

/// Runs `f`, stamping `phase`'s `started_at` before and `ended_at`/
/// `success` after - the async analogue of wrapping a block in a
/// try/finally that always records how the phase ended, matching
/// spec.md §4.7's "durable record of phase timings." Also logs the
/// phase's wall-clock duration at `blue`-highlighted `debug` level, in
/// the teacher's own `fmt::formatted_duration_rate` style.
async fn timed_phase<T, F, Fut>(run_log: &RunLog<'_>, run_id: &str, phase: RunPhase, f: F) -> Result<T, EtlError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, EtlError>>,
{
    run_log.phase_start(run_id, phase).await?;
    let started = Instant::now();
    let result = f().await;
    run_log.phase_complete(run_id, phase, result.is_ok()).await?;

    let (duration, _) = formatted_duration_rate(1, started.elapsed());
    tracing::debug!(run_id, ok = result.is_ok(), "phase {} finished in {}", phase_name(phase), core::fmt::blue(&duration));

    result
}

/// How one file's run through the pipeline ended. Mirrors the linear
/// state sequence spec.md §4.9 describes
/// (REGISTERED → DUPLICATE|PROCESSED → ARCHIVED → PARSED → STAGED →
/// AUDITED → MERGED → CLEANED → DONE, with FAILED reachable from any
/// state) collapsed to the outcomes a caller actually needs to act on.
#[derive(Debug)]
pub enum FileOutcome {
    Skipped,
    Duplicate,
    Processed { inserts: i64, updates: i64 },
    Failed(EtlError),
}

/// Runs one intake file through the full pipeline: source match, dup
/// check, archive, parse, validate, stage, audit, merge, clean up.
///
/// This is the async analogue of the original's `_process_file`: every
/// phase transition is logged to the durable Run Log, and the `finally:`
/// cleanup (unlink the source file, drop the stage table) always runs
/// regardless of how the file's processing ended, matching the
/// original's unconditional `finally` block in `_load_records`.
///
/// Only the owner lane is notified from here - immediately, per file, for
/// file-actionable errors (spec.md §7). Code-actionable failures are left
/// on the returned `FileOutcome` for the worker boundary to aggregate
/// into a single end-of-run operator notification (spec.md §2, §6).
pub async fn process_file(
    pool: &AnyPool,
    config: &Config,
    registry: &intake::SourceRegistry,
    path: &Path,
    owner: &dyn NotifyOwner,
) -> FileOutcome {
    let filename = path.file_name().expect("intake path has a filename").to_string_lossy().to_string();

    let spec = match registry.find_source_for_file(&filename) {
        Ok(None) => {
            tracing::warn!(filename = %filename, "no source configuration matches this file, skipping");
            return FileOutcome::Skipped;
        }
        Ok(Some(spec)) => spec,
        Err(err) => {
            notify::notify_owner_if_applicable(owner, &filename, "(unmatched)", "(unregistered)", &[], &err);
            return FileOutcome::Failed(err);
        }
    };

    let run_log = RunLog::new(pool);
    let run_id = Uuid::new_v4().to_string();
    let recipients = spec.notification_recipients();

    if let Err(err) = run_log.start(&run_id, &filename, spec.name()).await {
        notify::notify_owner_if_applicable(owner, &filename, spec.name(), &run_id, recipients, &err);
        return FileOutcome::Failed(err);
    }

    match run_file(pool, config, spec, path, &filename, &run_id, &run_log, owner).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let _ = run_log.fail(&run_id, err.kind_name(), &err.to_string()).await;
            notify::notify_owner_if_applicable(owner, &filename, spec.name(), &run_id, recipients, &err);
            FileOutcome::Failed(err)
        }
    }
}

async fn run_file(
    pool: &AnyPool,
    config: &Config,
    spec: &SourceSpec,
    path: &Path,
    filename: &str,
    run_id: &str,
    run_log: &RunLog<'_>,
    owner: &dyn NotifyOwner,
) -> Result<FileOutcome, EtlError> {
    if warehouse::is_duplicate_file(pool, spec.table_name(), filename).await? {
        folders::move_with_collision_handling(path, &config.duplicates_dir)?;
        run_log.duplicate(run_id).await?;
        // DuplicateFile is informational, not an error (spec.md §7), but
        // still notified to the owner on a best-effort basis (spec.md
        // §4.9.2): the owner may not otherwise know their resubmission
        // was a no-op.
        owner.notify_owner(&notify::OwnerNotification {
            file_name: filename,
            source_name: spec.name(),
            error_kind: "DuplicateFile",
            error_message: format!("{filename} was already loaded previously and has been moved to the duplicates directory"),
            run_log_id: run_id,
            recipients: spec.notification_recipients(),
        });
        return Ok(FileOutcome::Duplicate);
    }

    timed_phase(run_log, run_id, RunPhase::Archive, || async { folders::copy_to_archive(path, &config.archive_dir) }).await?;

    let dlq = DeadLetterQueue::new(pool, spec.dialect());
    let mut tally = ValidationTally::default();
    let mut valid_records = Vec::new();

    let processing: Result<(), EtlError> = timed_phase(run_log, run_id, RunPhase::Processing, || async {
        // A single pass over the reader produces both the valid-row and
        // failed-row streams (spec.md §9's "single iterator, fan out into
        // two batches"); failed rows are flushed to the DLQ as they
        // accumulate so they're persisted even if the file later fails
        // the threshold check or a later phase (spec.md §4.9.4: "always
        // flush remainders ... to persist any rows already produced").
        let raw_records = intake::read_records(path, spec)?;
        let mut dlq_batch = Vec::new();

        for (i, raw) in raw_records.iter().enumerate() {
            let outcome = validate(raw, spec, i + 1);
            tally.record(&outcome);
            match outcome {
                ValidationOutcome::Valid(record) => valid_records.push(record),
                ValidationOutcome::Failed(failed) => {
                    dlq_batch.push(failed);
                    if dlq_batch.len() >= config.batch_size {
                        dlq.insert_batch(filename, spec.table_name(), run_id, &dlq_batch).await?;
                        dlq_batch.clear();
                    }
                }
            }
        }
        dlq.insert_batch(filename, spec.table_name(), run_id, &dlq_batch).await?;

        if tally.exceeds(spec.validation_threshold()) {
            let sample = tally
                .sample_errors
                .iter()
                .map(|f| format!("row {}: {:?}", f.row_number, f.errors.iter().map(|e| &e.column_alias).collect::<Vec<_>>()))
                .collect();
            return Err(EtlError::ValidationThresholdExceeded {
                filename: filename.to_string(),
                failed: tally.failed,
                processed: tally.processed,
                threshold: spec.validation_threshold(),
                sample,
            });
        }

        Ok(())
    })
    .await;
    processing?;

    let stage_table = warehouse::schema::stage_table_name(filename);

    let result: Result<FileOutcome, EtlError> = async {
        timed_phase(run_log, run_id, RunPhase::StageLoad, || async {
            warehouse::stage::load_stage_table(pool, config, spec, &stage_table, filename, run_id, &valid_records).await
        })
        .await?;

        timed_phase(run_log, run_id, RunPhase::Audit, || async {
            warehouse::audit::audit_stage_table(pool, spec, &stage_table, filename).await
        })
        .await?;

        let counts = timed_phase(run_log, run_id, RunPhase::Merge, || async {
            warehouse::merge::merge_stage_into_target(pool, spec, &stage_table).await
        })
        .await?;

        // Only a successful merge earns the DLQ monotonicity cleanup:
        // a file that fails audit/merge keeps its prior run's dead
        // letters around, since this attempt didn't supersede them.
        dlq.purge_stale(filename, run_id).await?;

        Ok(FileOutcome::Processed { inserts: counts.inserts, updates: counts.updates })
    }
    .await;

    cleanup(pool, &stage_table, path).await;

    let outcome = result?;

    if let FileOutcome::Processed { inserts, updates } = &outcome {
        run_log
            .complete(run_id, tally.processed as i64, tally.failed as i64, valid_records.len() as i64, *inserts, *updates)
            .await?;
    }

    Ok(outcome)
}

/// Drops the stage table and removes the original intake-directory file,
/// regardless of whether the phases above succeeded - the Rust analogue
/// of the original's unconditional `finally:` block. Failures here are
/// logged, not propagated: a stage-table-drop failure must not mask the
/// real outcome of the file's processing.
async fn cleanup(pool: &AnyPool, stage_table: &str, path: &Path) {
    if let Err(err) = sqlx::query(&warehouse::schema::drop_stage_table_sql(stage_table)).execute(pool).await {
        tracing::warn!(stage_table, %err, "failed to drop stage table during cleanup");
    }

    if path.exists() {
        if let Err(err) = folders::remove_file(path) {
            tracing::warn!(path = %path.display(), %err, "failed to remove intake file during cleanup");
        }
    }
}
