use core::dialect::Dialect;
use core::semantic_type::SemanticType;
use core::source_spec::SourceSpec;

/// Maps a stage table's ephemeral name to the sanitized form the original
/// used (`db.py:sanitize_table_name`): non-alphanumeric characters become
/// `_`, and a `t_` prefix is added when the first character isn't a
/// letter (table names can't start with a digit or underscore in most
/// dialects).
pub fn sanitize_table_name(filename: &str) -> String {
    let stem = filename.rsplit('/').next().unwrap_or(filename);
    let stem = stem.rsplit_once('.').map(|(stem, _ext)| stem).unwrap_or(stem);

    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    match sanitized.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => sanitized,
        _ => format!("t_{sanitized}"),
    }
}

pub fn stage_table_name(filename: &str) -> String {
    format!("stage_{}", sanitize_table_name(filename))
}

fn sql_type_for(semantic_type: &SemanticType, dialect: Dialect) -> &'static str {
    match semantic_type.inner() {
        SemanticType::String => "TEXT",
        SemanticType::Int => "BIGINT",
        SemanticType::Decimal => match dialect {
            Dialect::Sqlite => "NUMERIC",
            _ => "DECIMAL(18,4)",
        },
        SemanticType::Float => "DOUBLE PRECISION",
        SemanticType::Bool => match dialect {
            Dialect::Sqlite => "INTEGER",
            _ => "BOOLEAN",
        },
        SemanticType::Date => "DATE",
        SemanticType::Datetime => "TIMESTAMP",
        SemanticType::Optional(_) => unreachable!("inner() strips exactly one layer of Optional"),
    }
}

fn nullability(semantic_type: &SemanticType) -> &'static str {
    if semantic_type.is_optional() {
        ""
    } else {
        " NOT NULL"
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a source's target table: declared
/// grain and fields, plus the three ETL columns spec.md §3 requires
/// (`etl_row_hash`, `source_filename`, `run_log_id`) and the two
/// timestamp columns the original added (`etl_created_at`/
/// `etl_updated_at`). Grain becomes the primary key; a secondary index on
/// `source_filename` matches the original's
/// `idx_{table}_source_filename`. Warns (does not fail) when the grain
/// has more than three columns, per `db.py:create_tables`.
pub fn create_target_table_sql(spec: &SourceSpec, dialect: Dialect) -> String {
    if spec.grain().len() > 3 {
        tracing::warn!(table = spec.table_name(), grain = ?spec.grain(), "grain has more than 3 columns");
    }

    let mut columns = Vec::new();
    for field in spec.fields() {
        columns.push(format!("{} {}{}", field.name(), sql_type_for(field.semantic_type(), dialect), nullability(field.semantic_type())));
    }

    let hash_type = match dialect {
        Dialect::Postgres => "BYTEA",
        Dialect::MySql | Dialect::SqlServer => "VARBINARY(4)",
        Dialect::Sqlite => "BLOB",
    };

    columns.push(format!("etl_row_hash {hash_type} NOT NULL"));
    columns.push("source_filename TEXT NOT NULL".to_string());
    columns.push("run_log_id TEXT NOT NULL".to_string());
    columns.push("etl_created_at TIMESTAMP NOT NULL".to_string());
    columns.push("etl_updated_at TIMESTAMP".to_string());

    let grain_cols = spec.grain().join(", ");
    let body = columns.join(", ");
    let table = spec.table_name();

    format!("CREATE TABLE IF NOT EXISTS {table} ({body}, PRIMARY KEY ({grain_cols}))")
}

pub fn create_target_indexes_sql(spec: &SourceSpec) -> String {
    let table = spec.table_name();
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_source_filename ON {table} (source_filename)")
}

/// The ephemeral staging table for one file: no primary key, no
/// timestamp columns, dropped (and recreated fresh) every run - matches
/// `db.py:create_stage_table`'s drop-then-create behavior. Carries the
/// same `etl_row_hash`/`source_filename`/`run_log_id` triple as the
/// target table (minus the two timestamp columns, which only the target
/// ever holds) so the merge can copy them straight across.
pub fn create_stage_table_sql(stage_table: &str, spec: &SourceSpec, dialect: Dialect) -> String {
    let mut columns = Vec::new();
    for field in spec.fields() {
        columns.push(format!("{} {}", field.name(), sql_type_for(field.semantic_type(), dialect)));
    }
    let hash_type = match dialect {
        Dialect::Postgres => "BYTEA",
        Dialect::MySql | Dialect::SqlServer => "VARBINARY(4)",
        Dialect::Sqlite => "BLOB",
    };
    columns.push(format!("etl_row_hash {hash_type}"));
    columns.push("source_filename TEXT".to_string());
    columns.push("run_log_id TEXT".to_string());

    format!("CREATE TABLE {stage_table} ({})", columns.join(", "))
}

pub fn drop_stage_table_sql(stage_table: &str) -> String {
    format!("DROP TABLE IF EXISTS {stage_table}")
}

/// The durable Run Log table: one row per file processing attempt, with
/// an independent `started_at`/`ended_at`/`success` triple for each of
/// the five phases spec.md §3 names (archive, processing, stage_load,
/// audit, merge) plus the file-level outcome columns - a richer model
/// than the original's single mutable `status`/`FileLoadLog` row, which
/// only ever held the *current* phase rather than every phase's history.
pub fn create_run_log_table_sql(dialect: Dialect) -> String {
    let id_type = match dialect {
        Dialect::Sqlite => "TEXT",
        _ => "UUID",
    };
    format!(
        "CREATE TABLE IF NOT EXISTS etl_run_log (\
            id {id_type} PRIMARY KEY, \
            filename TEXT NOT NULL, \
            source_name TEXT NOT NULL, \
            started_at TIMESTAMP NOT NULL, \
            ended_at TIMESTAMP, \
            archive_started_at TIMESTAMP, archive_ended_at TIMESTAMP, archive_success BOOLEAN, \
            processing_started_at TIMESTAMP, processing_ended_at TIMESTAMP, processing_success BOOLEAN, \
            stage_load_started_at TIMESTAMP, stage_load_ended_at TIMESTAMP, stage_load_success BOOLEAN, \
            audit_started_at TIMESTAMP, audit_ended_at TIMESTAMP, audit_success BOOLEAN, \
            merge_started_at TIMESTAMP, merge_ended_at TIMESTAMP, merge_success BOOLEAN, \
            duplicate_skipped BOOLEAN NOT NULL DEFAULT {false_literal}, \
            records_processed BIGINT, \
            validation_errors BIGINT, \
            records_stage_loaded BIGINT, \
            target_inserts BIGINT, \
            target_updates BIGINT, \
            success BOOLEAN, \
            error_type TEXT, \
            error_detail TEXT\
        )",
        false_literal = match dialect {
            Dialect::Sqlite => "0",
            _ => "FALSE",
        }
    )
}

/// The Dead Letter Queue: one row per rejected source record (spec.md
/// §3's `DeadLetterRow`), retained until a later run successfully
/// reprocesses the same filename (spec.md §4.9.7's monotonicity: rows
/// from a prior `run_log_id` for a filename are deleted once that
/// filename's newest run merges cleanly).
pub fn create_dlq_table_sql(dialect: Dialect) -> String {
    let id_type = match dialect {
        Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
        Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        Dialect::MySql => "BIGINT AUTO_INCREMENT PRIMARY KEY",
        Dialect::SqlServer => "BIGINT IDENTITY(1,1) PRIMARY KEY",
    };
    format!(
        "CREATE TABLE IF NOT EXISTS etl_dead_letter (\
            id {id_type}, \
            source_filename TEXT NOT NULL, \
            file_row_number BIGINT NOT NULL, \
            file_record_data TEXT NOT NULL, \
            validation_errors TEXT NOT NULL, \
            run_log_id TEXT NOT NULL, \
            target_table_name TEXT NOT NULL, \
            failed_at TIMESTAMP NOT NULL\
        )"
    )
}

/// `file_record_data`/`validation_errors` are stored as native JSON where
/// the dialect has a JSON type, else as text - spec.md §6's SQL-Server
/// cap (4000 chars, truncated with `…`) applies only on that dialect.
pub fn truncate_for_sqlserver(json: &str) -> String {
    const CAP: usize = 4000;
    if json.chars().count() <= CAP {
        json.to_string()
    } else {
        let mut truncated: String = json.chars().take(CAP - 1).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_alnum_to_underscore() {
        assert_eq!(sanitize_table_name("sales-2026.01.csv"), "sales_2026_01");
    }

    #[test]
    fn prefixes_t_when_leading_char_is_not_a_letter() {
        assert_eq!(sanitize_table_name("2026_sales.csv"), "t_2026_sales");
    }

    #[test]
    fn stage_table_name_is_prefixed() {
        assert_eq!(stage_table_name("sales_2026.csv"), "stage_sales_2026");
    }
}
