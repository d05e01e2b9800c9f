//! Core error types for dump parsing and diffing

use thiserror::Error;

/// Core error type for all operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line is not an insert statement for table {table}")]
    RowPatternMismatch { table: String },

    #[error("value count mismatch for table {table}: expected {expected}, got {actual}")]
    RowValueCount {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("no line {line} in data file {path}")]
    LineOutOfRange { path: String, line: u64 },
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
