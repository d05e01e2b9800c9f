//! Line-indexed lazy row access

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use super::RowSource;
use crate::domain::{Row, Table};
use crate::error::{CoreError, Result};
use crate::parser;
use crate::parser::row::{extract_row_with, insert_pattern};

/// A [`RowSource`] holding only a key to line-number index of the dump
/// file; row data is re-read and reconstructed on demand and not cached
/// beyond the call that produced it.
pub struct LazyRowSource {
    table: Arc<Table>,
    data_file: PathBuf,
    line_numbers: HashMap<String, u64>,
}

impl LazyRowSource {
    pub fn new(
        table: Arc<Table>,
        data_file: impl Into<PathBuf>,
        line_numbers: HashMap<String, u64>,
    ) -> LazyRowSource {
        LazyRowSource {
            table,
            data_file: data_file.into(),
            line_numbers,
        }
    }

    /// Builds the source by indexing the line number of every row of
    /// `table` in the dump file, without materializing the rows.
    pub fn from_file(table: Arc<Table>, path: &Path) -> LazyRowSource {
        let line_numbers = parser::read_row_lines(&table, path);
        LazyRowSource::new(table, path, line_numbers)
    }

    /// All (key, line) entries sorted by key.
    fn sorted_entries(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .line_numbers
            .iter()
            .map(|(k, &n)| (k.clone(), n))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// The (key, line) entries for the given keys, in no particular order.
    fn filtered_entries(&self, keys: &[String]) -> Vec<(String, u64)> {
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        self.line_numbers
            .iter()
            .filter(|(k, _)| wanted.contains(k.as_str()))
            .map(|(k, &n)| (k.clone(), n))
            .collect()
    }

    /// Reconstructs the rows for the given entries with a single pass over
    /// the data file: entries are visited in ascending line order, skipping
    /// forward by the line delta between consecutive entries. The handler
    /// therefore sees rows in physical line order, not key order.
    fn collect_rows(&self, mut entries: Vec<(String, u64)>, mut handler: impl FnMut(Row)) {
        entries.sort_by_key(|&(_, line)| line);

        let file = match File::open(&self.data_file) {
            Ok(file) => file,
            Err(e) => {
                error!(path = %self.data_file.display(), "failed to open data file: {e}");
                return;
            }
        };

        let pattern = insert_pattern(&self.table);
        let mut lines = BufReader::new(file).lines();
        let mut lines_read = 0u64;

        for (key, target) in entries {
            let mut line = None;
            while lines_read <= target {
                match lines.next() {
                    Some(Ok(l)) => line = Some(l),
                    Some(Err(e)) => {
                        error!(path = %self.data_file.display(), "failed to read data line: {e}");
                        return;
                    }
                    None => {
                        error!(line = target, "data file ended before indexed line");
                        return;
                    }
                }
                lines_read += 1;
            }

            let Some(line) = line else { continue };
            match extract_row_with(&self.table, &line, &pattern) {
                Ok(row) => handler(row),
                Err(e) => debug!(key = %key, line = target, "discarding indexed line: {e}"),
            }
        }
    }

    /// Re-reads a single line from the data file, streaming from the top.
    fn read_line(&self, line_number: u64) -> Result<String> {
        let file = File::open(&self.data_file)?;
        BufReader::new(file)
            .lines()
            .nth(line_number as usize)
            .transpose()?
            .ok_or_else(|| CoreError::LineOutOfRange {
                path: self.data_file.display().to_string(),
                line: line_number,
            })
    }
}

impl RowSource for LazyRowSource {
    fn table_name(&self) -> &str {
        &self.table.name
    }

    fn count(&self) -> usize {
        self.line_numbers.len()
    }

    fn contains_row(&self, key: &str) -> bool {
        self.line_numbers.contains_key(key)
    }

    // O(file size) per call; meant for incidental access, not bulk iteration.
    fn get_row(&self, key: &str) -> Option<Row> {
        let line_number = *self.line_numbers.get(key)?;
        let row = self
            .read_line(line_number)
            .and_then(|line| parser::extract_row(&self.table, &line));

        match row {
            Ok(row) => Some(row),
            Err(e) => {
                error!(key = %key, line = line_number, "failed to re-read row: {e}");
                None
            }
        }
    }

    fn part(&self, start: usize, len: usize) -> Vec<Row> {
        let entries = self.sorted_entries();
        if start >= entries.len() {
            return Vec::new();
        }
        let end = start.saturating_add(len).min(entries.len());

        let mut rows = Vec::new();
        self.collect_rows(entries[start..end].to_vec(), |row| rows.push(row));
        rows.sort_by_key(|row| row.index_key());

        rows
    }

    fn part_map(&self, start: usize, len: usize) -> BTreeMap<String, Row> {
        let entries = self.sorted_entries();
        if start >= entries.len() {
            return BTreeMap::new();
        }
        let end = start.saturating_add(len).min(entries.len());

        let mut map = BTreeMap::new();
        self.collect_rows(entries[start..end].to_vec(), |row| {
            map.insert(row.index_key(), row);
        });

        map
    }

    fn rows(&self, keys: &[String]) -> Vec<Row> {
        let mut rows = Vec::new();
        self.collect_rows(self.filtered_entries(keys), |row| rows.push(row));
        rows.sort_by_key(|row| row.index_key());

        rows
    }

    fn rows_map(&self, keys: &[String]) -> BTreeMap<String, Row> {
        let mut map = BTreeMap::new();
        self.collect_rows(self.filtered_entries(keys), |row| {
            map.insert(row.index_key(), row);
        });

        map
    }
}
