mod sources;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use conductor::{process_files_parallel, FileOutcome, LoggingNotifier, RunResult};
use core::config::Config;
use core::dialect::Dialect;
use intake::SourceRegistry;

const ELIGIBLE_SUFFIXES: &[&str] = &[".csv", ".csv.gz", ".xlsx", ".xls", ".json", ".json.gz"];

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        tracing::error!(%err, "loader exiting with an error");
        std::process::exit(1);
    }
}

/// Wires the workspace together: load config, connect, bootstrap
/// schema, scan the intake directory, process every eligible file.
///
/// Grounded on `original_source/src/main.py`'s top-level `main()`
/// (`load_config` → `create_engine` → `create_tables` →
/// `scan_intake_dir` → `process_files_parallel` → summarize and exit),
/// translated onto this workspace's async/`sqlx` stack.
async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing::info!(intake_dir = %config.intake_dir.display(), worker_count = config.worker_count, "starting loader run");

    let pool = warehouse::pool::connect(&config).await?;
    warehouse::pool::preflight(&pool).await?;

    let dialect = config.dialect().unwrap_or(Dialect::Sqlite);
    let sources = sources::example_sources(dialect);
    warehouse::bootstrap_schema(&pool, &sources).await?;

    let registry = Arc::new(SourceRegistry::new(sources));
    let files = scan_intake_dir(&config.intake_dir)?;
    tracing::info!(count = files.len(), "found eligible files");

    let run_result = process_files_parallel(
        Arc::new(pool),
        Arc::new(config),
        registry,
        files,
        Arc::new(LoggingNotifier),
        Arc::new(LoggingNotifier),
    )
    .await;

    summarize(&run_result)
}

/// Lists regular files directly under `dir` whose name ends with one of
/// `ELIGIBLE_SUFFIXES`, skipping dotfiles and subdirectories - spec.md
/// §5's intake directory contract.
fn scan_intake_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if filename.starts_with('.') {
            continue;
        }
        let lower = filename.to_ascii_lowercase();
        if ELIGIBLE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Logs a per-outcome breakdown and implements spec.md §6's exit
/// contract: exit 0 if every file succeeded, was a recognized
/// duplicate, or failed only with file-actionable errors (owners were
/// notified); non-zero only if a code-actionable failure occurred *and*
/// the aggregated operator notification could not be delivered.
fn summarize(run: &RunResult) -> anyhow::Result<()> {
    let (mut processed, mut duplicates, mut skipped, mut owner_failed, mut code_failed) = (0, 0, 0, 0, 0);

    for outcome in &run.outcomes {
        match outcome {
            FileOutcome::Processed { inserts, updates } => {
                processed += 1;
                tracing::info!(inserts, updates, "file processed");
            }
            FileOutcome::Duplicate => duplicates += 1,
            FileOutcome::Skipped => skipped += 1,
            FileOutcome::Failed(err) if err.notify_owner() => {
                owner_failed += 1;
                tracing::warn!(%err, "file failed with a file-actionable error; owner notified");
            }
            FileOutcome::Failed(err) => {
                code_failed += 1;
                tracing::error!(%err, "file failed with a code-actionable error");
            }
        }
    }

    tracing::info!(processed, duplicates, skipped, owner_failed, code_failed, "loader run complete");

    if code_failed > 0 && !run.operator_notified {
        anyhow::bail!("{code_failed} file(s) failed with code-actionable errors and the operator could not be notified");
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
