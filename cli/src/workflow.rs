//! End-to-end run over two dump snapshots
//!
//! Parses the table definitions from both dumps, applies the name filters,
//! writes the table-listing report, pairs tables by name and runs the diff
//! engine for each pair. Report faults are logged and the run continues
//! best-effort; each table owns an independent output artifact.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use dump_diff_core::diff::{DiffProcessor, DiffSummary};
use dump_diff_core::domain::Table;
use dump_diff_core::parser::read_tables_from_file;
use dump_diff_core::source::{EagerRowSource, LazyRowSource, RowSource};

use crate::args::Options;

const TABLE_REPORT_FILE: &str = "00-ReadTables.txt";
const SUMMARY_FILE: &str = "summary.json";

/// Statement counts for one processed table
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub table: String,
    #[serde(flatten)]
    pub counts: DiffSummary,
}

/// Aggregate result of one run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub tables: Vec<TableSummary>,
    pub total_inserts: usize,
    pub total_updates: usize,
    pub total_deletes: usize,
}

impl RunSummary {
    fn push(&mut self, table: String, counts: DiffSummary) {
        self.total_inserts += counts.inserts;
        self.total_updates += counts.updates;
        self.total_deletes += counts.deletes;
        self.tables.push(TableSummary { table, counts });
    }
}

/// One configured diff run
pub struct Workflow {
    options: Options,
}

impl Workflow {
    pub fn new(options: Options) -> Workflow {
        Workflow { options }
    }

    pub fn run(&self) -> RunSummary {
        info!(file = %self.options.original_file.display(), "collecting tables from original dump");
        let mut original_tables = read_tables_from_file(&self.options.original_file);
        info!(count = original_tables.len(), "tables read");

        info!(file = %self.options.changed_file.display(), "collecting tables from changed dump");
        let mut changed_tables = read_tables_from_file(&self.options.changed_file);
        info!(count = changed_tables.len(), "tables read");

        self.apply_filters(&mut original_tables);
        self.apply_filters(&mut changed_tables);

        if let Err(e) = self.write_table_report(&original_tables, &changed_tables) {
            error!("failed to write table report: {e}");
        }

        let mut summary = RunSummary::default();

        info!("determining changes");
        for original_table in &original_tables {
            let Some(changed_table) = changed_tables.iter().find(|t| t.name == original_table.name)
            else {
                continue;
            };

            info!(table = %original_table.name, "processing table");
            let original_rows = self.build_source(original_table, &self.options.original_file);
            let changed_rows = self.build_source(changed_table, &self.options.changed_file);
            info!(
                original = original_rows.count(),
                changed = changed_rows.count(),
                "rows read"
            );

            if original_rows.count() == 0 || changed_rows.count() == 0 {
                info!(table = %original_table.name, "skipped, one side has no rows");
                continue;
            }

            let mut processor =
                DiffProcessor::new(original_table.name.clone(), &self.options.output_dir);
            let counts = processor.process(original_rows.as_ref(), changed_rows.as_ref());
            summary.push(original_table.name.clone(), counts);
        }

        if let Err(e) = self.write_summary(&summary) {
            error!("failed to write run summary: {e}");
        }

        summary
    }

    /// Applies the table-name filters; the inclusion list wins when both
    /// are supplied. Matching is case-insensitive.
    fn apply_filters(&self, tables: &mut Vec<Table>) {
        if let Some(include) = &self.options.include_tables {
            tables.retain(|t| include.contains(&t.name.to_lowercase()));
        } else if let Some(exclude) = &self.options.exclude_tables {
            tables.retain(|t| !exclude.contains(&t.name.to_lowercase()));
        }
    }

    fn build_source(&self, table: &Table, path: &Path) -> Box<dyn RowSource> {
        let table = Arc::new(table.clone());
        if self.options.lazy {
            Box::new(LazyRowSource::from_file(table, path))
        } else {
            Box::new(EagerRowSource::from_file(table, path))
        }
    }

    /// Writes the audit listing of the parsed table shapes.
    fn write_table_report(&self, original: &[Table], changed: &[Table]) -> std::io::Result<()> {
        let path = self.options.output_dir.join(TABLE_REPORT_FILE);
        let mut writer = BufWriter::new(File::create(path)?);

        write_table_section(&mut writer, "Original tables", original)?;
        write_table_section(&mut writer, "Changed tables", changed)?;

        writer.flush()
    }

    fn write_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let path = self.options.output_dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(path, json)?;

        Ok(())
    }
}

fn write_table_section(
    writer: &mut impl Write,
    title: &str,
    tables: &[Table],
) -> std::io::Result<()> {
    writeln!(writer, "*")?;
    writeln!(writer, "* {title}:")?;
    writeln!(writer, "*")?;
    writeln!(writer)?;

    for table in tables {
        writeln!(writer, "Table {} (", table.name)?;
        for column in &table.columns {
            writeln!(writer, "  {column}")?;
        }
        writeln!(writer, ")")?;
        writeln!(writer)?;
    }

    Ok(())
}
