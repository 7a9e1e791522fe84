//! # Export Pipeline
//!
//! Replaces the contents of one worksheet of a workbook on a cloud drive with a table:
//! the workbook is created when missing, the target worksheet is reset, the table is
//! written in chunks, and the columns are fitted to their content.
use crate::database::table::Table;
use crate::error::ExportError;
use crate::helpers::xlsx::empty_workbook;
use crate::remote::DriveItem;
use crate::remote::RemoteDrive;
use crate::remote::RemoteError;
use crate::remote::RemoteWorksheet;
use crate::spreadsheet::chunk::DEFAULT_CHUNK_SIZE;
use crate::spreadsheet::lifecycle::reset_worksheet;
use crate::spreadsheet::writer::write_table;
use tracing::info;

/// Knobs of a single export run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    /// Rows per range update, header included
    pub chunk_size: usize,
    /// Replace the worksheet with a fresh one instead of clearing it in place
    pub recreate: bool,
    /// Fit column widths to the written content
    pub auto_fit: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            recreate: true,
            auto_fit: true,
        }
    }
}

/// Looks up the item at `path`; lookup failures other than "not found" propagate.
pub fn find_item<D: RemoteDrive>(drive: &D, path: &str) -> Result<Option<DriveItem>, RemoteError> {
    match drive.get_item_by_path(path) {
        Ok(item) => Ok(Some(item)),
        Err(RemoteError::ItemNotFound { .. }) => Ok(None),
        Err(error) => Err(error),
    }
}

pub fn file_exists<D: RemoteDrive>(drive: &D, path: &str) -> Result<bool, RemoteError> {
    Ok(find_item(drive, path)?.is_some())
}

/// Returns the workbook at `path`, uploading an empty one with a `sheet_name` worksheet when absent.
pub fn ensure_workbook<D: RemoteDrive>(drive: &D, path: &str, sheet_name: &str) -> Result<DriveItem, ExportError> {
    if let Some(item) = find_item(drive, path)? {
        return Ok(item);
    }
    let item = drive.upload_file(path, empty_workbook(sheet_name)?)?;
    info!(path, "workbook not found, empty workbook created");
    Ok(item)
}

/// Fits the columns of the worksheet's used range to their content.
pub fn auto_fit_columns<W: RemoteWorksheet>(sheet: &W) -> Result<(), RemoteError> {
    let used_range = sheet.used_range()?;
    sheet.auto_fit_columns(&used_range)
}

/// Writes `table` into worksheet `sheet_name` of the workbook at `path`, replacing its contents.
pub fn update_excel_data<D: RemoteDrive>(
    drive: &D,
    table: &mut Table,
    path: &str,
    sheet_name: &str,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let item = ensure_workbook(drive, path, sheet_name)?;
    let workbook = drive.open_workbook(&item)?;
    let sheet = reset_worksheet(&workbook, sheet_name, options.recreate)?;

    table.fill_empty();
    write_table(&sheet, table, options.chunk_size)?;

    if options.auto_fit {
        auto_fit_columns(&sheet)?;
    }
    info!(path, sheet = sheet_name, rows = table.height(), "export finished");
    Ok(())
}
