///
/// SQL dialect targeted by the Merger and Staging Loader. `Postgres`,
/// `MySql`, and `Sqlite` are backed by a real `sqlx::AnyPool` driver;
/// `SqlServer` renders correct SQL text and batch-size math but has no
/// bound driver in this workspace (see DESIGN.md).
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    SqlServer,
    Sqlite,
}

impl Dialect {
    /// Upper bound on rows per INSERT batch for this dialect, given the
    /// target table's column count and the configured batch size.
    ///
    /// Only SQL Server has a hard parameter-count ceiling (2100 params per
    /// statement in practice; the original stays well clear of it with a
    /// 1000-param budget): `max(1, (1000 / column_count) - 1)`. Every other
    /// dialect is bounded only by the configured batch size.
    pub fn max_batch_rows(&self, column_count: usize, configured_batch_size: usize) -> usize {
        match self {
            Dialect::SqlServer => {
                let cap = (1000 / column_count.max(1)).saturating_sub(1).max(1);
                cap.min(configured_batch_size)
            }
            Dialect::Postgres | Dialect::MySql | Dialect::Sqlite => configured_batch_size,
        }
    }

    /// Renders the stage-to-target upsert for this dialect.
    ///
    /// `business_non_grain_columns` is the source's declared, non-grain
    /// fields only (`SourceSpec::non_grain_columns`) - the three shared
    /// ETL columns every stage/target table carries (`etl_row_hash`,
    /// `source_filename`, `run_log_id`) are appended here, not by the
    /// caller, since their handling is identical across every source:
    /// copied verbatim from stage on both insert and update.
    /// `etl_created_at` is set only on insert (`now`); `etl_updated_at`
    /// advances only when `etl_row_hash` changes on a matched row (an
    /// explicit refinement over the original, which touched it on every
    /// matched row regardless of whether the hash differed - see
    /// DESIGN.md Open Questions) and is `NULL` on insert.
    pub fn render_upsert(
        &self,
        target_table: &str,
        stage_table: &str,
        grain: &[String],
        business_non_grain_columns: &[String],
    ) -> String {
        let mut cols = business_non_grain_columns.to_vec();
        cols.extend(["etl_row_hash".to_string(), "source_filename".to_string(), "run_log_id".to_string()]);

        match self {
            Dialect::Postgres | Dialect::SqlServer => self.render_merge(target_table, stage_table, grain, &cols),
            Dialect::MySql => self.render_on_duplicate_key(target_table, stage_table, grain, &cols),
            Dialect::Sqlite => self.render_on_conflict(target_table, stage_table, grain, &cols),
        }
    }

    /// `cols` is every stage-sourced column except the grain: declared
    /// business fields plus `etl_row_hash`/`source_filename`/`run_log_id`.
    /// `etl_created_at`/`etl_updated_at` are handled separately since
    /// stage rows carry neither.
    fn render_merge(&self, target: &str, stage: &str, grain: &[String], cols: &[String]) -> String {
        let join = grain.iter().map(|g| format!("t.{g} = s.{g}")).collect::<Vec<_>>().join(" AND ");
        let set_clause = cols
            .iter()
            .map(|c| format!("t.{c} = s.{c}"))
            .chain(std::iter::once("t.etl_updated_at = CURRENT_TIMESTAMP".to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_cols = grain.iter().chain(cols.iter()).cloned().chain(["etl_created_at".to_string(), "etl_updated_at".to_string()]).collect::<Vec<_>>().join(", ");
        let insert_vals = grain
            .iter()
            .chain(cols.iter())
            .map(|c| format!("s.{c}"))
            .chain(["CURRENT_TIMESTAMP".to_string(), "NULL".to_string()])
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "MERGE INTO {target} AS t USING {stage} AS s ON {join} \
             WHEN MATCHED AND t.etl_row_hash <> s.etl_row_hash THEN UPDATE SET {set_clause} \
             WHEN NOT MATCHED THEN INSERT ({insert_cols}) VALUES ({insert_vals});"
        )
    }

    fn render_on_duplicate_key(&self, target: &str, stage: &str, grain: &[String], cols: &[String]) -> String {
        let insert_cols = grain.iter().chain(cols.iter()).cloned().chain(["etl_created_at".to_string(), "etl_updated_at".to_string()]).collect::<Vec<_>>().join(", ");
        let select_cols = grain
            .iter()
            .chain(cols.iter())
            .map(|c| format!("s.{c}"))
            .chain(["CURRENT_TIMESTAMP".to_string(), "NULL".to_string()])
            .collect::<Vec<_>>()
            .join(", ");
        let update_clause = cols
            .iter()
            .map(|c| format!("{c} = IF(etl_row_hash <> VALUES(etl_row_hash), VALUES({c}), {c})"))
            .chain(std::iter::once(
                "etl_updated_at = IF(etl_row_hash <> VALUES(etl_row_hash), CURRENT_TIMESTAMP, etl_updated_at)".to_string(),
            ))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {target} ({insert_cols}) SELECT {select_cols} FROM {stage} AS s \
             ON DUPLICATE KEY UPDATE {update_clause};"
        )
    }

    fn render_on_conflict(&self, target: &str, stage: &str, grain: &[String], cols: &[String]) -> String {
        let insert_cols = grain.iter().chain(cols.iter()).cloned().chain(["etl_created_at".to_string(), "etl_updated_at".to_string()]).collect::<Vec<_>>().join(", ");
        let select_cols = grain
            .iter()
            .chain(cols.iter())
            .map(|c| format!("s.{c}"))
            .chain(["CURRENT_TIMESTAMP".to_string(), "NULL".to_string()])
            .collect::<Vec<_>>()
            .join(", ");
        let conflict_cols = grain.join(", ");
        let update_clause = cols
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .chain(std::iter::once(
                "etl_updated_at = CASE WHEN target.etl_row_hash <> excluded.etl_row_hash THEN CURRENT_TIMESTAMP ELSE target.etl_updated_at END".to_string(),
            ))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {target} AS target ({insert_cols}) SELECT {select_cols} FROM {stage} AS s \
             WHERE true \
             ON CONFLICT({conflict_cols}) DO UPDATE SET {update_clause};"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlserver_batch_cap_matches_original_formula() {
        // original: max_rows = (1000 // column_count) - 1; max(1, min(max_rows, BATCH_SIZE))
        assert_eq!(Dialect::SqlServer.max_batch_rows(10, 10_000), 99);
        assert_eq!(Dialect::SqlServer.max_batch_rows(999, 10_000), 1);
        assert_eq!(Dialect::SqlServer.max_batch_rows(2000, 10_000), 1);
    }

    #[test]
    fn non_sqlserver_dialects_are_bounded_only_by_configured_batch_size() {
        assert_eq!(Dialect::Postgres.max_batch_rows(500, 10_000), 10_000);
        assert_eq!(Dialect::Sqlite.max_batch_rows(3, 50), 50);
    }

    #[test]
    fn no_dialect_ever_emits_a_batch_exceeding_1000_params_for_sqlserver() {
        for cols in 1..=500 {
            let rows = Dialect::SqlServer.max_batch_rows(cols, 100_000);
            assert!(rows * cols <= 1000, "cols={cols} rows={rows}");
        }
    }

    #[test]
    fn sqlite_upsert_advances_updated_at_only_on_hash_change() {
        let sql = Dialect::Sqlite.render_upsert("target", "stage_x", &["id".to_string()], &["name".to_string()]);
        assert!(sql.contains("ON CONFLICT(id) DO UPDATE"));
        assert!(sql.contains("CASE WHEN target.etl_row_hash <> excluded.etl_row_hash"));
    }

    #[test]
    fn sqlite_upsert_carries_the_shared_etl_columns_without_the_caller_naming_them() {
        let sql = Dialect::Sqlite.render_upsert("target", "stage_x", &["id".to_string()], &["name".to_string()]);
        assert!(sql.contains("etl_row_hash"));
        assert!(sql.contains("source_filename"));
        assert!(sql.contains("run_log_id"));
        assert!(sql.contains("etl_created_at"));
    }

    #[test]
    fn postgres_merge_inserts_etl_created_at_as_now_and_leaves_etl_updated_at_null() {
        let sql = Dialect::Postgres.render_upsert("target", "stage_x", &["id".to_string()], &["name".to_string()]);
        assert!(sql.contains("INSERT (id, name, etl_row_hash, source_filename, run_log_id, etl_created_at, etl_updated_at)"));
        assert!(sql.contains("VALUES (s.id, s.name, s.etl_row_hash, s.source_filename, s.run_log_id, CURRENT_TIMESTAMP, NULL)"));
    }

    #[test]
    fn mysql_upsert_only_touches_business_and_etl_columns_on_duplicate_key() {
        let sql = Dialect::MySql.render_upsert("target", "stage_x", &["id".to_string()], &["name".to_string()]);
        assert!(sql.contains("ON DUPLICATE KEY UPDATE"));
        assert!(sql.contains("name = IF(etl_row_hash <> VALUES(etl_row_hash), VALUES(name), name)"));
    }
}
