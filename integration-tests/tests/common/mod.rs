use std::path::PathBuf;

use sqlx::{AnyPool, Row};

use conductor::LoggingNotifier;
use core::config::Config;
use core::dialect::Dialect;
use core::semantic_type::SemanticType;
use core::source_spec::{FieldSpec, SourceFormat, SourceSpec};
use intake::SourceRegistry;

/// A minimal stand-in for `original_source/src/sources/systems/sales`:
/// delimited, grain on `transaction_id`, a two-column positivity audit.
/// Built fresh per test so each test's `table_name` can't collide with
/// another test's in-memory database.
pub fn sales_source(table_name: &str) -> SourceSpec {
    SourceSpec::new(
        "sales",
        "sales_*.csv",
        table_name,
        vec!["transaction_id".to_string()],
        vec![
            FieldSpec::new("transaction_id", SemanticType::String),
            FieldSpec::new("customer_id", SemanticType::String),
            FieldSpec::new("quantity", SemanticType::Int),
            FieldSpec::new("total_amount", SemanticType::Float),
            FieldSpec::new("sale_date", SemanticType::Date),
        ],
        SourceFormat::Delimited { delimiter: b',', skip_rows: 0 },
        Dialect::Sqlite,
    )
}

/// A disposable harness: an on-disk SQLite database (so every worker
/// task/connection in the pool sees the same data — `:memory:` does not
/// survive across connections), an intake/archive/duplicates directory
/// tree under a `tempfile::TempDir`, and the bootstrapped schema for
/// `sources`.
pub struct Harness {
    pub pool: AnyPool,
    pub config: Config,
    pub registry: SourceRegistry,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new(sources: Vec<SourceSpec>) -> Self {
        sqlx::any::install_default_drivers();

        let dir = tempfile::tempdir().unwrap();
        let intake_dir = dir.path().join("intake");
        let archive_dir = dir.path().join("archive");
        let duplicates_dir = dir.path().join("duplicates");
        std::fs::create_dir_all(&intake_dir).unwrap();

        let db_path = dir.path().join("etl.sqlite");
        let pool = AnyPool::connect(&format!("sqlite://{}?mode=rwc", db_path.display())).await.unwrap();

        warehouse::bootstrap_schema(&pool, &sources).await.unwrap();

        let config = Config {
            database_url: format!("sqlite://{}", db_path.display()),
            intake_dir,
            archive_dir,
            duplicates_dir,
            batch_size: 1_000,
            log_level: "info".to_string(),
            worker_count: 1,
            owner_webhook_url: None,
            operator_webhook_url: None,
        };

        let registry = SourceRegistry::new(sources);

        Harness { pool, config, registry, _dir: dir }
    }

    pub fn write_intake_file(&self, filename: &str, contents: &str) -> PathBuf {
        let path = self.config.intake_dir.join(filename);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub async fn process(&self, path: &std::path::Path) -> conductor::FileOutcome {
        conductor::process_file(&self.pool, &self.config, &self.registry, path, &LoggingNotifier).await
    }

    pub async fn row_count(&self, table: &str) -> i64 {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}")).fetch_one(&self.pool).await.unwrap();
        row.try_get::<i64, _>("n").unwrap()
    }

    pub async fn dlq_row_numbers(&self, filename: &str) -> Vec<i64> {
        let rows = sqlx::query("SELECT file_row_number FROM etl_dead_letter WHERE source_filename = ? ORDER BY file_row_number")
            .bind(filename)
            .fetch_all(&self.pool)
            .await
            .unwrap();
        rows.iter().map(|r| r.try_get::<i64, _>("file_row_number").unwrap()).collect()
    }

    pub async fn stage_tables(&self) -> Vec<String> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'stage_%'")
            .fetch_all(&self.pool)
            .await
            .unwrap();
        rows.iter().map(|r| r.try_get::<String, _>("name").unwrap()).collect()
    }
}
