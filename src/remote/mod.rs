//! # Remote Workbook Module
//!
//! Collaborator interfaces for a workbook stored on a cloud drive. The export
//! pipeline only talks to these traits; [`graph`] implements them over the
//! Microsoft Graph REST API and [`auth`] supplies its access tokens.
use crate::database::table::CellValue;
use crate::spreadsheet::reference::RangeAddress;
use serde::Deserialize;
use thiserror::Error;

pub mod auth;
pub mod graph;
#[cfg(test)]
pub(crate) mod memory;

/// Errors reported by a remote drive or workbook.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The drive has no item at the requested path
    #[error("Item '{path}' not found")]
    ItemNotFound { path: String },

    /// The workbook has no worksheet with the requested name
    #[error("Worksheet '{name}' not found")]
    WorksheetNotFound { name: String },

    /// The service answered with an error status
    #[error("Remote call failed with status {status} ({code}): {message}")]
    Api { status: u16, code: String, message: String },

    /// The service answered with a body that couldn't be understood
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The request URL couldn't be built from the base endpoint
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("{0}")]
    TransportError(#[from] reqwest::Error),

    #[error("{0}")]
    UrlError(#[from] url::ParseError),
}

/// Identity of a worksheet inside a workbook.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WorksheetInfo {
    pub id: String,
    pub name: String,
}

/// A file or folder stored on a drive.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
}

/// A single worksheet of a remote workbook.
pub trait RemoteWorksheet {
    /// Returns the worksheet name
    fn name(&self) -> &str;

    /// Overwrites the values of the range; `values` must match its shape
    fn set_range(&self, address: &RangeAddress, values: &[Vec<CellValue>]) -> Result<(), RemoteError>;

    /// Returns the smallest range containing every used cell
    fn used_range(&self) -> Result<RangeAddress, RemoteError>;

    /// Clears the values of the range
    fn clear_range(&self, address: &RangeAddress) -> Result<(), RemoteError>;

    /// Adjusts column widths of the range to fit their content
    fn auto_fit_columns(&self, address: &RangeAddress) -> Result<(), RemoteError>;
}

/// A remote workbook holding an ordered list of worksheets.
pub trait RemoteWorkbook {
    type Worksheet: RemoteWorksheet;

    /// Lists all worksheets in workbook order
    fn list_worksheets(&self) -> Result<Vec<WorksheetInfo>, RemoteError>;

    /// Appends a new, empty worksheet
    fn add_worksheet(&self, name: &str) -> Result<WorksheetInfo, RemoteError>;

    /// Deletes a worksheet; the service refuses to delete the last one
    fn delete_worksheet(&self, id: &str) -> Result<(), RemoteError>;

    /// Renames a worksheet, keeping its identity
    fn rename_worksheet(&self, id: &str, new_name: &str) -> Result<(), RemoteError>;

    /// Returns a handle to an existing worksheet
    fn worksheet(&self, info: &WorksheetInfo) -> Self::Worksheet;
}

/// A cloud drive addressed by slash-separated paths.
pub trait RemoteDrive {
    type Workbook: RemoteWorkbook;

    /// Returns the drive identifier
    fn id(&self) -> &str;

    /// Looks up an item, failing with [`RemoteError::ItemNotFound`] when absent
    fn get_item_by_path(&self, path: &str) -> Result<DriveItem, RemoteError>;

    /// Uploads a file to the path, replacing any existing one
    fn upload_file(&self, path: &str, content: Vec<u8>) -> Result<DriveItem, RemoteError>;

    /// Opens a workbook file for editing
    fn open_workbook(&self, item: &DriveItem) -> Result<Self::Workbook, RemoteError>;

    /// Lists the folders directly under the drive root
    fn list_root_folders(&self) -> Result<Vec<DriveItem>, RemoteError>;
}
