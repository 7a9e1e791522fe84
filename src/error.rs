use thiserror::Error;

/// Main error type for the export utility.
/// Aggregates errors from dependencies and from the crate's own modules.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Third-party library errors
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    // Database module errors
    #[error("{0}")]
    TableError(#[from] crate::database::table::TableError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Remote module errors
    #[error("{0}")]
    RemoteError(#[from] crate::remote::RemoteError),

    #[error("{0}")]
    AuthError(#[from] crate::remote::auth::AuthError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

pub trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ExportError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ExportError::WithContextError(format!("{}: {}", message, e)))
    }
}
