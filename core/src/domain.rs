//! Domain models for parsed SQL dumps

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::key;

/// Broad value category of a SQL column type, derived from keyword
/// matching against the raw type token. Types with no matching keyword
/// stay unclassified (`None` on [`Column`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Numeric,
    Decimal,
    Bit,
    Character,
    Boolean,
    Date,
    Binary,
}

impl ColumnType {
    /// Classify a raw SQL type token by keyword.
    pub fn from_sql(sql_type: &str) -> Option<ColumnType> {
        const KEYWORDS: &[(ColumnType, &[&str])] = &[
            (
                ColumnType::Numeric,
                &["TINYINT", "SMALLINT", "INTEGER", "BIGINT"],
            ),
            (ColumnType::Decimal, &["NUMERIC", "DECIMAL", "DOUBLE"]),
            (ColumnType::Bit, &["BIT", "BITVARYING"]),
            (ColumnType::Character, &["CHAR", "VARCHAR", "CLOB"]),
            (ColumnType::Boolean, &["BOOLEAN"]),
            (ColumnType::Date, &["DATE", "TIME", "TIMESTAMP"]),
            (ColumnType::Binary, &["BINARY", "VARBINARY", "BLOB"]),
        ];

        for (column_type, keywords) in KEYWORDS {
            if keywords.iter().any(|keyword| sql_type.contains(keyword)) {
                return Some(*column_type);
            }
        }

        None
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single column of a parsed table definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub column_type: Option<ColumnType>,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        column_type: Option<ColumnType>,
        primary_key: bool,
        unique: bool,
        nullable: bool,
    ) -> Column {
        Column {
            name: name.into(),
            column_type,
            primary_key,
            unique,
            nullable,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_name = match self.column_type {
            Some(column_type) => column_type.to_string(),
            None => "unknown".to_string(),
        };
        write!(
            f,
            "Column {} (type={}, primary_key={}, unique={}, nullable={})",
            self.name, type_name, self.primary_key, self.unique, self.nullable
        )
    }
}

/// A parsed table definition. Column position defines the positional
/// alignment used by every [`Row`] of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Table {
        Table {
            name: name.into(),
            columns,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary-key columns in declaration order.
    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Positional indices of the primary-key columns. These indices are
    /// the stable contract all row operations key against.
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self
            .columns
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "Table {} ({})", self.name, columns)
    }
}

/// One data row of a table, holding the raw literal text of each value
/// positionally aligned to the table's columns.
#[derive(Debug, Clone)]
pub struct Row {
    table: Arc<Table>,
    values: Vec<String>,
}

impl Row {
    pub fn new(table: Arc<Table>, values: Vec<String>) -> Row {
        Row { table, values }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The row's primary-key values, in primary-key declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.table
            .primary_key_indices()
            .into_iter()
            .map(|i| self.values[i].as_str())
            .collect()
    }

    /// Canonical index key of the row, joined from the primary-key values.
    pub fn index_key(&self) -> String {
        key::index_key(&self.primary_key())
    }
}

// Equality and hashing are structural over the value sequence only.
impl PartialEq for Row {
    fn eq(&self, other: &Row) -> bool {
        self.values == other.values
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Arc<Table> {
        Arc::new(Table::new(
            "USERS",
            vec![
                Column::new("ID", Some(ColumnType::Numeric), true, true, false),
                Column::new("NAME", Some(ColumnType::Character), false, false, true),
                Column::new("TENANT", Some(ColumnType::Numeric), true, true, false),
            ],
        ))
    }

    #[test]
    fn test_column_type_from_sql() {
        assert_eq!(ColumnType::from_sql("INTEGER"), Some(ColumnType::Numeric));
        assert_eq!(
            ColumnType::from_sql("VARCHAR(50)"),
            Some(ColumnType::Character)
        );
        assert_eq!(ColumnType::from_sql("TIMESTAMP"), Some(ColumnType::Date));
        assert_eq!(
            ColumnType::from_sql("VARBINARY(16)"),
            Some(ColumnType::Binary)
        );
        assert_eq!(ColumnType::from_sql("GEOMETRY"), None);
    }

    #[test]
    fn test_primary_key_indices_preserve_declaration_order() {
        let table = sample_table();
        assert_eq!(table.primary_key_indices(), vec![0, 2]);
        assert_eq!(
            table
                .primary_key()
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            vec!["ID", "TENANT"]
        );
    }

    #[test]
    fn test_row_index_key_composite() {
        let row = Row::new(
            sample_table(),
            vec!["1".to_string(), "'a'".to_string(), "7".to_string()],
        );
        assert_eq!(row.primary_key(), vec!["1", "7"]);
        assert_eq!(row.index_key(), "1,7");
    }

    #[test]
    fn test_row_equality_ignores_table() {
        let values = vec!["1".to_string(), "'a'".to_string(), "7".to_string()];
        let row1 = Row::new(sample_table(), values.clone());
        let row2 = Row::new(sample_table(), values);
        assert_eq!(row1, row2);

        let row3 = Row::new(
            sample_table(),
            vec!["1".to_string(), "'b'".to_string(), "7".to_string()],
        );
        assert_ne!(row1, row3);
    }

    #[test]
    fn test_column_display() {
        let column = Column::new("ID", Some(ColumnType::Numeric), true, true, false);
        assert_eq!(
            column.to_string(),
            "Column ID (type=Numeric, primary_key=true, unique=true, nullable=false)"
        );
    }
}
