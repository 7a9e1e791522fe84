//! # Sheet Export
//!
//! Exports the result of a SQL query into a named worksheet of an Excel workbook stored
//! on SharePoint or OneDrive.
//!
//! ## Pipeline
//!
//! 1. The query runs against DuckDB, optionally after init statements that attach an
//!    external database, and the result is loaded into a [`Table`].
//! 2. The workbook is looked up on the drive and seeded with an empty `.xlsx` when missing.
//! 3. The target worksheet is replaced by a fresh one (or cleared in place).
//! 4. Header and rows are written in chunks of at most `chunk_size` rows, blank cells as `""`.
//! 5. Columns are fitted to their content.
//!
//! All remote operations go through the [`RemoteDrive`], [`RemoteWorkbook`] and
//! [`RemoteWorksheet`] traits; [`remote::graph`] implements them over Microsoft Graph.
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod helpers;
pub mod remote;
pub mod spreadsheet;

pub use database::table::CellValue;
pub use database::table::Table;
pub use error::ExportError;
pub use export::update_excel_data;
pub use export::ExportOptions;
pub use remote::RemoteDrive;
pub use remote::RemoteWorkbook;
pub use remote::RemoteWorksheet;
