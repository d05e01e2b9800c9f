//! Dump diff core library
//!
//! Parses two textual SQL dump snapshots into table and row models and
//! computes the INSERT/UPDATE/DELETE statements transforming the original
//! snapshot into the changed one.

pub mod diff;
pub mod domain;
pub mod error;
pub mod key;
pub mod parser;
pub mod source;

pub use error::{CoreError, Result};
