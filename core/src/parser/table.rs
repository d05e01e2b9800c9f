//! DDL parsing: builds [`Table`] definitions from the schema statements of
//! a dump file.
//!
//! Statements are line-oriented; a table definition must fit on a single
//! line. Lines that match no known statement shape are skipped.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use tracing::{debug, error};

use crate::domain::{Column, ColumnType, Table};

/// Compiled patterns for the recognized DDL statement shapes.
pub(crate) struct DdlPatterns {
    table: Regex,
    unique_index: Regex,
    primary_key_constraint: Regex,
    unique_constraint: Regex,
    foreign_key_constraint: Regex,
    column: Regex,
}

impl DdlPatterns {
    pub(crate) fn new() -> DdlPatterns {
        DdlPatterns {
            table: Regex::new(r"^CREATE (MEMORY )?TABLE (PUBLIC\.)?(\w+)\s?\((.*)\)$")
                .expect("table pattern"),
            unique_index: Regex::new(r"^CREATE UNIQUE INDEX\s?(\w+) ON (PUBLIC\.)?(\w+)\s?\((\w+)\)$")
                .expect("unique index pattern"),
            primary_key_constraint: Regex::new(
                r"^(CONSTRAINT\s+(\w+)\s+)?PRIMARY KEY\s?\((\w+\s*(,\s*\w+\s*)*)\)$",
            )
            .expect("primary key constraint pattern"),
            unique_constraint: Regex::new(r"^(CONSTRAINT\s+(\w+)\s+)?UNIQUE\s?\((\w+\s*(,\s*\w+\s*)*)\)$")
                .expect("unique constraint pattern"),
            foreign_key_constraint: Regex::new(
                r"^(CONSTRAINT\s+(\w+)\s+)?FOREIGN KEY\s?\((\w+\s*(,\s*\w+\s*)*)\)\s?REFERENCES PUBLIC\.(\w+)\s?\((\w+\s*(,\s*\w+\s*)*)\)$",
            )
            .expect("foreign key constraint pattern"),
            column: Regex::new(r"^(\w+)\s+.*$").expect("column pattern"),
        }
    }
}

/// Classification of one schema line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DdlLine {
    Table(Table),
    UniqueIndex { table: String, column: String },
    Other,
}

/// Classification of one fragment of a table body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Column(Column),
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey,
    Other,
}

/// Reads all table definitions from the schema statements in the file at
/// `path`, in file order. Standalone `CREATE UNIQUE INDEX` statements are
/// collected across the whole file and applied to the finished table list
/// in a second pass.
///
/// Unrecognized lines are skipped. An I/O failure aborts the read; the
/// fault is logged and the tables accumulated so far are returned.
pub fn read_tables_from_file(path: &Path) -> Vec<Table> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), "failed to open dump file: {e}");
            return Vec::new();
        }
    };

    read_tables(BufReader::new(file))
}

pub(crate) fn read_tables(reader: impl BufRead) -> Vec<Table> {
    let patterns = DdlPatterns::new();
    let mut tables: Vec<Table> = Vec::new();
    let mut unique_indices: HashMap<String, HashSet<String>> = HashMap::new();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("failed to read dump line: {e}");
                break;
            }
        };

        match classify_line(&patterns, &line) {
            DdlLine::Table(table) => tables.push(table),
            DdlLine::UniqueIndex { table, column } => {
                unique_indices.entry(table).or_default().insert(column);
            }
            DdlLine::Other => {}
        }
    }

    apply_unique_indices(&mut tables, &unique_indices);

    tables
}

pub(crate) fn classify_line(patterns: &DdlPatterns, line: &str) -> DdlLine {
    if let Some(caps) = patterns.table.captures(line) {
        let name = caps[3].to_string();
        let columns = extract_columns(patterns, &caps[4]);
        return DdlLine::Table(Table::new(name, columns));
    }

    if let Some(caps) = patterns.unique_index.captures(line) {
        return DdlLine::UniqueIndex {
            table: caps[3].to_string(),
            column: caps[4].to_string(),
        };
    }

    DdlLine::Other
}

/// Builds the column list from a table body, classifying each fragment and
/// back-patching constraint flags onto the columns created so far.
fn extract_columns(patterns: &DdlPatterns, body: &str) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();

    for fragment in split_body(body) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }

        match classify_fragment(patterns, fragment) {
            Fragment::Column(column) => columns.push(column),
            Fragment::PrimaryKey(names) => {
                for column in columns.iter_mut().filter(|c| names.contains(&c.name)) {
                    column.primary_key = true;
                    column.unique = true;
                }
            }
            Fragment::Unique(names) => {
                for column in columns.iter_mut().filter(|c| names.contains(&c.name)) {
                    column.unique = true;
                }
            }
            Fragment::ForeignKey => {
                debug!("skipping foreign key constraint: {fragment}");
            }
            Fragment::Other => {}
        }
    }

    columns
}

/// Classifies one body fragment. Constraints take priority over plain
/// column definitions since a column definition matches almost anything.
pub(crate) fn classify_fragment(patterns: &DdlPatterns, fragment: &str) -> Fragment {
    if let Some(caps) = patterns.primary_key_constraint.captures(fragment) {
        return Fragment::PrimaryKey(split_name_list(&caps[3]));
    }

    if let Some(caps) = patterns.unique_constraint.captures(fragment) {
        return Fragment::Unique(split_name_list(&caps[3]));
    }

    if patterns.foreign_key_constraint.is_match(fragment) {
        return Fragment::ForeignKey;
    }

    if let Some(name) = patterns.column.captures(fragment).and_then(|caps| caps.get(1)) {
        let type_token = &fragment[name.end()..];
        let primary_key = fragment.contains("PRIMARY KEY");

        return Fragment::Column(Column::new(
            name.as_str(),
            ColumnType::from_sql(type_token),
            primary_key,
            primary_key || fragment.contains("UNIQUE"),
            !fragment.contains("NOT NULL"),
        ));
    }

    Fragment::Other
}

/// Splits a table body on commas, tracking parenthesis nesting so commas
/// inside composite-column-list constraints are not split points.
fn split_body(body: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in body.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => fragments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        fragments.push(current);
    }

    fragments
}

fn split_name_list(list: &str) -> Vec<String> {
    list.split(',').map(|name| name.trim().to_string()).collect()
}

/// Marks every column referenced by a standalone unique index as unique.
fn apply_unique_indices(tables: &mut [Table], unique_indices: &HashMap<String, HashSet<String>>) {
    for table in tables.iter_mut() {
        if let Some(names) = unique_indices.get(&table.name) {
            for column in table.columns.iter_mut().filter(|c| names.contains(&c.name)) {
                column.unique = true;
            }
        }
    }
}
