//! # Spreadsheet Module
//!
//! Everything needed to place a table into a remote worksheet: cell references,
//! the chunk plan that bounds each range update, the chunked range writer, and the
//! worksheet lifecycle used to prepare an empty target sheet.
use crate::remote::RemoteError;
use thiserror::Error;

pub mod chunk;
pub mod lifecycle;
pub mod reference;
pub mod writer;

/// Custom error types for spreadsheet operations.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Chunk size must allow at least one row per update
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    /// Range bounds are inverted, zero-based or unparsable
    #[error("Invalid range '{0}'")]
    InvalidRange(String),

    /// Worksheet names are limited to 31 characters and exclude `[]:*?/\`
    #[error("Invalid worksheet name '{0}'")]
    InvalidSheetName(String),

    /// A range update failed; later chunks were not written
    #[error("Write range '{address}' failed: {source}")]
    RangeWrite {
        address: String,
        #[source]
        source: RemoteError,
    },
}
