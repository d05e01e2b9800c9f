//! Row-level diff between two snapshots of one table
//!
//! Classifies rows as created, updated or deleted and appends one SQL
//! statement per change to the table's output file. Processing is paginated
//! in fixed-size windows so memory stays bounded regardless of row count.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::domain::Row;
use crate::error::Result;
use crate::source::RowSource;

/// Default pagination window.
pub const DEFAULT_PART_SIZE: usize = 5000;

/// Statement counts of one table diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Number of INSERT statements emitted
    pub inserts: usize,
    /// Number of UPDATE statements emitted
    pub updates: usize,
    /// Number of DELETE statements emitted
    pub deletes: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }
}

/// Computes the statements transforming one table's original row state
/// into the changed one and writes them to `<output_dir>/<table>.txt`.
///
/// The output file opens lazily on the first statement and is closed when
/// processing ends, on the failure path included. A write failure aborts
/// the remaining output for the table; the fault is logged, not raised.
pub struct DiffProcessor {
    table_name: String,
    output_dir: PathBuf,
    part_size: usize,
    writer: Option<BufWriter<File>>,
}

impl DiffProcessor {
    pub fn new(table_name: impl Into<String>, output_dir: impl Into<PathBuf>) -> DiffProcessor {
        DiffProcessor {
            table_name: table_name.into(),
            output_dir: output_dir.into(),
            part_size: DEFAULT_PART_SIZE,
            writer: None,
        }
    }

    /// Overrides the pagination window. The window never shrinks below one
    /// row.
    pub fn with_part_size(mut self, part_size: usize) -> DiffProcessor {
        self.part_size = part_size.max(1);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Path of the statement file this processor writes.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.txt", self.table_name))
    }

    /// Runs the three classification passes in sequence: all creates, then
    /// all updates, then all deletes. Within a pass, statements follow the
    /// key-sorted window iteration.
    pub fn process(&mut self, original: &dyn RowSource, changed: &dyn RowSource) -> DiffSummary {
        let mut summary = DiffSummary::default();

        if let Err(e) = self.run_passes(original, changed, &mut summary) {
            error!(table = %self.table_name, "aborting diff output: {e}");
        }

        self.close_writer();

        debug!(
            table = %self.table_name,
            inserts = summary.inserts,
            updates = summary.updates,
            deletes = summary.deletes,
            "table diff finished"
        );

        summary
    }

    fn run_passes(
        &mut self,
        original: &dyn RowSource,
        changed: &dyn RowSource,
        summary: &mut DiffSummary,
    ) -> Result<()> {
        self.check_created(original, changed, summary)?;
        self.check_updated(original, changed, summary)?;
        self.check_deleted(original, changed, summary)?;

        Ok(())
    }

    /// Rows present only in the changed state become INSERT statements.
    fn check_created(
        &mut self,
        original: &dyn RowSource,
        changed: &dyn RowSource,
        summary: &mut DiffSummary,
    ) -> Result<()> {
        for start in (0..changed.count()).step_by(self.part_size) {
            for row in changed.part(start, self.part_size) {
                if !original.contains_row(&row.index_key()) {
                    self.write_statement(&build_insert(&row))?;
                    summary.inserts += 1;
                }
            }
        }

        Ok(())
    }

    /// Rows present in both states with differing values become UPDATE
    /// statements. The changed-side rows are fetched as one batch
    /// projection per window, never as per-row point lookups, to amortize
    /// the cost of a lazy source.
    fn check_updated(
        &mut self,
        original: &dyn RowSource,
        changed: &dyn RowSource,
        summary: &mut DiffSummary,
    ) -> Result<()> {
        for start in (0..original.count()).step_by(self.part_size) {
            let original_part = original.part_map(start, self.part_size);
            let keys: Vec<String> = original_part.keys().cloned().collect();
            let changed_part = changed.rows_map(&keys);

            for (key, original_row) in &original_part {
                let Some(changed_row) = changed_part.get(key) else {
                    continue;
                };

                if changed_row != original_row {
                    self.write_statement(&build_update(original_row, changed_row))?;
                    summary.updates += 1;
                }
            }
        }

        Ok(())
    }

    /// Rows present only in the original state become DELETE statements.
    fn check_deleted(
        &mut self,
        original: &dyn RowSource,
        changed: &dyn RowSource,
        summary: &mut DiffSummary,
    ) -> Result<()> {
        for start in (0..original.count()).step_by(self.part_size) {
            for row in original.part(start, self.part_size) {
                if !changed.contains_row(&row.index_key()) {
                    self.write_statement(&build_delete(&row))?;
                    summary.deletes += 1;
                }
            }
        }

        Ok(())
    }

    /// Writes one statement line, opening the output file on first use.
    fn write_statement(&mut self, statement: &str) -> Result<()> {
        if self.writer.is_none() {
            let file = File::create(self.output_path())?;
            self.writer = Some(BufWriter::new(file));
        }

        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{statement}")?;
        }

        Ok(())
    }

    /// Flushes and drops the writer if it was opened. Runs on every exit
    /// path of [`DiffProcessor::process`].
    fn close_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                error!(table = %self.table_name, "failed to flush diff output: {e}");
            }
        }
    }
}

fn build_insert(row: &Row) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        row.table().name,
        row.table().column_names().join(", "),
        row.values().join(", ")
    )
}

/// SET lists only the differing columns with the changed row's values;
/// WHERE lists every primary-key column.
fn build_update(original: &Row, changed: &Row) -> String {
    let table = changed.table();
    let names = table.column_names();

    let assignments = names
        .iter()
        .enumerate()
        .filter(|&(i, _)| original.values()[i] != changed.values()[i])
        .map(|(i, name)| format!("{}={}", name, changed.values()[i]))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "UPDATE {} SET {} WHERE {};",
        table.name,
        assignments,
        build_key_condition(changed)
    )
}

fn build_delete(row: &Row) -> String {
    format!(
        "DELETE FROM {} WHERE {};",
        row.table().name,
        build_key_condition(row)
    )
}

/// `pk1 = v1 AND pk2 = v2 ...` over the row's primary-key columns, using
/// the values at the primary-key indices.
fn build_key_condition(row: &Row) -> String {
    let names = row.table().column_names();

    row.table()
        .primary_key_indices()
        .into_iter()
        .map(|i| format!("{} = {}", names[i], row.values()[i]))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnType, Table};
    use crate::source::EagerRowSource;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sample_table() -> Arc<Table> {
        Arc::new(Table::new(
            "T",
            vec![
                Column::new("ID", Some(ColumnType::Numeric), true, true, false),
                Column::new("NAME", Some(ColumnType::Character), false, false, true),
            ],
        ))
    }

    fn composite_table() -> Arc<Table> {
        Arc::new(Table::new(
            "M",
            vec![
                Column::new("NAME", Some(ColumnType::Character), false, false, true),
                Column::new("A", Some(ColumnType::Numeric), true, true, false),
                Column::new("B", Some(ColumnType::Numeric), true, true, false),
            ],
        ))
    }

    fn source_of(table: &Arc<Table>, rows: &[&[&str]]) -> EagerRowSource {
        let map: HashMap<String, Row> = rows
            .iter()
            .map(|values| {
                let row = Row::new(
                    table.clone(),
                    values.iter().map(|v| v.to_string()).collect(),
                );
                (row.index_key(), row)
            })
            .collect();

        EagerRowSource::new(table.clone(), map)
    }

    fn read_output(processor: &DiffProcessor) -> Vec<String> {
        std::fs::read_to_string(processor.output_path())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_identical_sources_emit_nothing() {
        let table = sample_table();
        let rows: &[&[&str]] = &[&["1", "'a'"], &["2", "'b'"]];
        let original = source_of(&table, rows);
        let changed = source_of(&table, rows);
        let dir = tempfile::tempdir().unwrap();

        let mut processor = DiffProcessor::new("T", dir.path());
        let summary = processor.process(&original, &changed);

        assert_eq!(summary, DiffSummary::default());
        // The writer opens lazily, so no file appears either.
        assert!(!processor.output_path().exists());
    }

    #[test]
    fn test_created_and_deleted_rows() {
        let table = sample_table();
        let original = source_of(&table, &[&["1", "'a'"], &["2", "'b'"]]);
        let changed = source_of(&table, &[&["2", "'b'"], &["3", "'c'"]]);
        let dir = tempfile::tempdir().unwrap();

        let mut processor = DiffProcessor::new("T", dir.path());
        let summary = processor.process(&original, &changed);

        assert_eq!(summary.inserts, 1);
        assert_eq!(summary.updates, 0);
        assert_eq!(summary.deletes, 1);

        let lines = read_output(&processor);
        assert_eq!(
            lines,
            vec![
                "INSERT INTO T (ID, NAME) VALUES (3, 'c');",
                "DELETE FROM T WHERE ID = 1;",
            ]
        );
    }

    #[test]
    fn test_updated_row_sets_only_changed_columns() {
        let table = sample_table();
        let original = source_of(&table, &[&["1", "'a'"]]);
        let changed = source_of(&table, &[&["1", "'b'"]]);
        let dir = tempfile::tempdir().unwrap();

        let mut processor = DiffProcessor::new("T", dir.path());
        let summary = processor.process(&original, &changed);

        assert_eq!(summary.updates, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(
            read_output(&processor),
            vec!["UPDATE T SET NAME='b' WHERE ID = 1;"]
        );
    }

    #[test]
    fn test_composite_key_condition_uses_key_indices() {
        let table = composite_table();
        let original = source_of(&table, &[&["'x'", "1", "2"]]);
        let changed = source_of(&table, &[&["'y'", "1", "2"]]);
        let dir = tempfile::tempdir().unwrap();

        let mut processor = DiffProcessor::new("M", dir.path());
        processor.process(&original, &changed);

        assert_eq!(
            read_output(&processor),
            vec!["UPDATE M SET NAME='y' WHERE A = 1 AND B = 2;"]
        );
    }

    #[test]
    fn test_categories_run_in_sequence_and_key_order() {
        let table = sample_table();
        let original = source_of(
            &table,
            &[&["2", "'b'"], &["4", "'d'"], &["5", "'e'"], &["1", "'a'"]],
        );
        let changed = source_of(
            &table,
            &[&["2", "'B'"], &["4", "'d'"], &["3", "'c'"], &["0", "'z'"]],
        );
        let dir = tempfile::tempdir().unwrap();

        // A window smaller than the row count exercises the pagination.
        let mut processor = DiffProcessor::new("T", dir.path()).with_part_size(2);
        let summary = processor.process(&original, &changed);

        assert_eq!(summary.inserts, 2);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.deletes, 2);

        assert_eq!(
            read_output(&processor),
            vec![
                "INSERT INTO T (ID, NAME) VALUES (0, 'z');",
                "INSERT INTO T (ID, NAME) VALUES (3, 'c');",
                "UPDATE T SET NAME='B' WHERE ID = 2;",
                "DELETE FROM T WHERE ID = 1;",
                "DELETE FROM T WHERE ID = 5;",
            ]
        );
    }

    #[test]
    fn test_summary_serializes() {
        let summary = DiffSummary {
            inserts: 1,
            updates: 2,
            deletes: 3,
        };
        let json = serde_json::to_string(&summary).unwrap();

        assert!(json.contains("\"updates\":2"));
    }
}
