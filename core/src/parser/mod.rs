//! Parsers for the schema and data statements of a SQL dump

pub mod row;
pub mod table;

pub use row::{extract_row, read_row_lines, read_rows};
pub use table::read_tables_from_file;
