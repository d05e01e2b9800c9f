//! DML parsing: extracts [`Row`] instances for one table from the insert
//! statements of a dump file.
//!
//! A line qualifies only if it is exactly an `INSERT INTO <table> VALUES
//! (...)` statement for the target table. Values are kept verbatim, quotes
//! included, since the diff output reuses the literal text unmodified.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error};

use crate::domain::{Row, Table};
use crate::error::{CoreError, Result};

pub(crate) fn insert_pattern(table: &Table) -> Regex {
    Regex::new(&format!(
        r"^INSERT INTO {} VALUES\s*\((.*)\)$",
        regex::escape(&table.name)
    ))
    .expect("insert pattern")
}

/// Reads all rows of `table` from the file at `path` into a map keyed by
/// the canonical index key. A duplicate primary key within one pass is
/// overwritten by the later line.
pub fn read_rows(table: &Arc<Table>, path: &Path) -> HashMap<String, Row> {
    let mut rows = HashMap::new();
    scan_rows(table, path, |row, _| {
        let key = row.index_key();
        if rows.insert(key.clone(), row).is_some() {
            debug!(table = %table.name, key = %key, "duplicate primary key, keeping later row");
        }
    });

    rows
}

/// Reads the source line number of every row of `table` from the file at
/// `path`, keyed by the canonical index key, without materializing rows
/// beyond the scan. Line numbers are zero-based.
pub fn read_row_lines(table: &Arc<Table>, path: &Path) -> HashMap<String, u64> {
    let mut lines = HashMap::new();
    scan_rows(table, path, |row, line_number| {
        let key = row.index_key();
        if lines.insert(key.clone(), line_number).is_some() {
            debug!(table = %table.name, key = %key, "duplicate primary key, keeping later line");
        }
    });

    lines
}

/// Builds a row of `table` from a single insert statement line.
pub fn extract_row(table: &Arc<Table>, line: &str) -> Result<Row> {
    extract_row_with(table, line, &insert_pattern(table))
}

pub(crate) fn extract_row_with(table: &Arc<Table>, line: &str, pattern: &Regex) -> Result<Row> {
    let caps = pattern
        .captures(line)
        .ok_or_else(|| CoreError::RowPatternMismatch {
            table: table.name.clone(),
        })?;

    let values = split_values(&caps[1]);
    if values.len() != table.columns.len() {
        return Err(CoreError::RowValueCount {
            table: table.name.clone(),
            expected: table.columns.len(),
            actual: values.len(),
        });
    }

    Ok(Row::new(table.clone(), values))
}

/// Streams the file once and passes every qualifying row of `table` to the
/// handler together with its zero-based line number. Lines for other tables
/// are passed over; structurally broken insert lines are discarded with a
/// log entry. An I/O failure aborts the scan and logs the fault.
fn scan_rows(table: &Arc<Table>, path: &Path, mut handler: impl FnMut(Row, u64)) {
    let pattern = insert_pattern(table);
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), "failed to open dump file: {e}");
            return;
        }
    };

    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(path = %path.display(), "failed to read dump line: {e}");
                break;
            }
        };

        match extract_row_with(table, &line, &pattern) {
            Ok(row) => handler(row, line_number as u64),
            Err(CoreError::RowPatternMismatch { .. }) => {}
            Err(e) => debug!(line = line_number, "discarding insert line: {e}"),
        }
    }
}

/// Splits a value list on commas that are not inside a single-quoted
/// literal. Each quote flips the "inside literal" state; the tokens keep
/// their quotes and surrounding whitespace.
fn split_values(data: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_literal = false;

    for ch in data.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                current.push(ch);
            }
            ',' if !in_literal => values.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        values.push(current);
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnType};
    use std::io::Write;

    fn two_column_table() -> Arc<Table> {
        Arc::new(Table::new(
            "T",
            vec![
                Column::new("A", Some(ColumnType::Numeric), true, true, false),
                Column::new("B", Some(ColumnType::Character), false, false, true),
            ],
        ))
    }

    #[test]
    fn test_comma_inside_literal_does_not_split() {
        let table = two_column_table();
        let row = extract_row(&table, "INSERT INTO T VALUES (1,'x,y')").unwrap();

        assert_eq!(row.values(), ["1", "'x,y'"]);
    }

    #[test]
    fn test_doubled_quote_keeps_literal_intact() {
        let table = two_column_table();
        let row = extract_row(&table, "INSERT INTO T VALUES (1,'it''s, ok')").unwrap();

        assert_eq!(row.values(), ["1", "'it''s, ok'"]);
    }

    #[test]
    fn test_value_count_mismatch_is_inspectable() {
        let table = two_column_table();
        let err = extract_row(&table, "INSERT INTO T VALUES (1,'a','extra')").unwrap_err();

        match err {
            CoreError::RowValueCount {
                expected, actual, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_statement_is_a_pattern_mismatch() {
        let table = two_column_table();
        let err = extract_row(&table, "CREATE TABLE T (A INT)").unwrap_err();

        assert!(matches!(err, CoreError::RowPatternMismatch { .. }));
    }

    #[test]
    fn test_similarly_prefixed_table_does_not_match() {
        let table = two_column_table();
        let err = extract_row(&table, "INSERT INTO TX VALUES (1,'a')").unwrap_err();

        assert!(matches!(err, CoreError::RowPatternMismatch { .. }));
    }

    #[test]
    fn test_read_rows_last_duplicate_wins() {
        let table = two_column_table();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "INSERT INTO T VALUES (1,'a')").unwrap();
        writeln!(file, "INSERT INTO T VALUES (2,'b')").unwrap();
        writeln!(file, "INSERT INTO T VALUES (1,'c')").unwrap();
        file.flush().unwrap();

        let rows = read_rows(&table, file.path());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows["1"].values(), ["1", "'c'"]);
    }

    #[test]
    fn test_read_row_lines_are_zero_based() {
        let table = two_column_table();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CREATE TABLE T (A INT PRIMARY KEY, B VARCHAR(10))").unwrap();
        writeln!(file, "INSERT INTO T VALUES (1,'a')").unwrap();
        writeln!(file, "INSERT INTO OTHER VALUES (9)").unwrap();
        writeln!(file, "INSERT INTO T VALUES (2,'b')").unwrap();
        file.flush().unwrap();

        let lines = read_row_lines(&table, file.path());

        assert_eq!(lines.len(), 2);
        assert_eq!(lines["1"], 1);
        assert_eq!(lines["2"], 3);
    }

    #[test]
    fn test_missing_file_yields_empty_map() {
        let table = two_column_table();
        let rows = read_rows(&table, Path::new("/nonexistent/dump.script"));

        assert!(rows.is_empty());
    }
}
