//! Fully materialized row access

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::RowSource;
use crate::domain::{Row, Table};
use crate::key;
use crate::parser;

/// A [`RowSource`] holding every row of the table in memory.
pub struct EagerRowSource {
    table: Arc<Table>,
    rows: HashMap<String, Row>,
}

impl EagerRowSource {
    pub fn new(table: Arc<Table>, rows: HashMap<String, Row>) -> EagerRowSource {
        EagerRowSource { table, rows }
    }

    /// Builds the source by reading all rows of `table` from the dump file
    /// up front.
    pub fn from_file(table: Arc<Table>, path: &Path) -> EagerRowSource {
        let rows = parser::read_rows(&table, path);
        EagerRowSource::new(table, rows)
    }

    // Re-sorted on every call; pagination over an eager source is not O(1).
    fn sorted_keys(&self) -> Vec<String> {
        key::sorted_keys(self.rows.keys().cloned())
    }
}

impl RowSource for EagerRowSource {
    fn table_name(&self) -> &str {
        &self.table.name
    }

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn contains_row(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    fn get_row(&self, key: &str) -> Option<Row> {
        self.rows.get(key).cloned()
    }

    fn part(&self, start: usize, len: usize) -> Vec<Row> {
        self.sorted_keys()
            .into_iter()
            .skip(start)
            .take(len)
            .map(|k| self.rows[&k].clone())
            .collect()
    }

    fn part_map(&self, start: usize, len: usize) -> BTreeMap<String, Row> {
        self.sorted_keys()
            .into_iter()
            .skip(start)
            .take(len)
            .map(|k| {
                let row = self.rows[&k].clone();
                (k, row)
            })
            .collect()
    }

    fn rows(&self, keys: &[String]) -> Vec<Row> {
        key::sorted_keys(keys.iter().cloned())
            .iter()
            .filter_map(|k| self.rows.get(k).cloned())
            .collect()
    }

    fn rows_map(&self, keys: &[String]) -> BTreeMap<String, Row> {
        keys.iter()
            .filter_map(|k| self.rows.get(k).map(|row| (k.clone(), row.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnType};

    fn source_with_keys(keys: &[&str]) -> EagerRowSource {
        let table = Arc::new(Table::new(
            "T",
            vec![
                Column::new("ID", Some(ColumnType::Numeric), true, true, false),
                Column::new("NAME", Some(ColumnType::Character), false, false, true),
            ],
        ));

        let rows = keys
            .iter()
            .map(|k| {
                let row = Row::new(
                    table.clone(),
                    vec![k.to_string(), format!("'name-{k}'")],
                );
                (row.index_key(), row)
            })
            .collect();

        EagerRowSource::new(table, rows)
    }

    fn keys_of(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.index_key()).collect()
    }

    #[test]
    fn test_all_rows_is_key_sorted() {
        let source = source_with_keys(&["3", "1", "2"]);

        assert_eq!(source.count(), 3);
        assert_eq!(keys_of(&source.all_rows()), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_part_partitions_the_universe() {
        let source = source_with_keys(&["5", "3", "1", "4", "2"]);

        let first = source.part(0, 2);
        let rest = source.part(2, 3);

        let mut all = keys_of(&first);
        all.extend(keys_of(&rest));
        assert_eq!(all, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_part_clamps_at_the_end() {
        let source = source_with_keys(&["1", "2"]);

        assert_eq!(source.part(1, 10).len(), 1);
        assert!(source.part(5, 10).is_empty());
    }

    #[test]
    fn test_rows_projection_is_key_sorted_and_skips_missing() {
        let source = source_with_keys(&["3", "1", "2"]);
        let keys = vec!["3".to_string(), "9".to_string(), "1".to_string()];

        assert_eq!(keys_of(&source.rows(&keys)), vec!["1", "3"]);

        let map = source.rows_map(&keys);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn test_part_map_is_key_ordered() {
        let source = source_with_keys(&["2", "1"]);
        let map = source.part_map(0, 2);

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
