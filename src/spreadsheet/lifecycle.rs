//! Worksheet lifecycle helpers: look up, create, rename, delete and reset worksheets by name.

use crate::helpers::xlsx::MAX_SHEET_NAME_CHARS;
use crate::remote::RemoteError;
use crate::remote::RemoteWorkbook;
use crate::remote::RemoteWorksheet;
use crate::remote::WorksheetInfo;
use tracing::info;
use tracing::warn;

/// Suffix of the name a worksheet is parked under while its replacement is created.
const TEMP_SUFFIX: &str = "__temp__";

/// Name a worksheet is parked under during a reset, shortened so it stays a valid sheet name.
fn temp_name(name: &str) -> String {
    let keep = MAX_SHEET_NAME_CHARS - TEMP_SUFFIX.len();
    let base: String = name.chars().take(keep).collect();
    format!("{}{}", base, TEMP_SUFFIX)
}

/// Returns the worksheet with the given name, if any.
pub fn find_worksheet<B: RemoteWorkbook>(workbook: &B, name: &str) -> Result<Option<WorksheetInfo>, RemoteError> {
    Ok(workbook.list_worksheets()?.into_iter().find(|info| info.name == name))
}

pub fn worksheet_exists<B: RemoteWorkbook>(workbook: &B, name: &str) -> Result<bool, RemoteError> {
    Ok(find_worksheet(workbook, name)?.is_some())
}

pub fn worksheet_count<B: RemoteWorkbook>(workbook: &B) -> Result<usize, RemoteError> {
    Ok(workbook.list_worksheets()?.len())
}

/// Creates a worksheet unless one with that name already exists.
pub fn create_worksheet<B: RemoteWorkbook>(workbook: &B, name: &str) -> Result<WorksheetInfo, RemoteError> {
    if let Some(info) = find_worksheet(workbook, name)? {
        return Ok(info);
    }
    let info = workbook.add_worksheet(name)?;
    info!(sheet = name, "worksheet created");
    Ok(info)
}

/// Renames a worksheet. A missing worksheet is reported and otherwise ignored.
pub fn rename_worksheet<B: RemoteWorkbook>(workbook: &B, old_name: &str, new_name: &str) -> Result<(), RemoteError> {
    match find_worksheet(workbook, old_name)? {
        Some(info) => workbook.rename_worksheet(&info.id, new_name),
        None => {
            warn!("{}", RemoteError::WorksheetNotFound { name: old_name.to_owned() });
            Ok(())
        }
    }
}

/// Deletes a worksheet unless it is missing or the last one in the workbook.
pub fn delete_worksheet<B: RemoteWorkbook>(workbook: &B, name: &str) -> Result<(), RemoteError> {
    let worksheets = workbook.list_worksheets()?;
    let Some(info) = worksheets.iter().find(|info| info.name == name) else {
        warn!("{}", RemoteError::WorksheetNotFound { name: name.to_owned() });
        return Ok(());
    };
    if worksheets.len() < 2 {
        warn!(sheet = name, "refusing to delete the only worksheet of the workbook");
        return Ok(());
    }
    workbook.delete_worksheet(&info.id)?;
    info!(sheet = name, "worksheet deleted");
    Ok(())
}

/// Clears the values of a worksheet's used range, keeping the worksheet itself.
pub fn clear_used_range<B: RemoteWorkbook>(workbook: &B, name: &str) -> Result<(), RemoteError> {
    let info = find_worksheet(workbook, name)?
        .ok_or_else(|| RemoteError::WorksheetNotFound { name: name.to_owned() })?;
    let worksheet = workbook.worksheet(&info);
    let used_range = worksheet.used_range()?;
    worksheet.clear_range(&used_range)
}

/// Makes sure an empty worksheet named `name` exists and returns a handle to it.
///
/// With `recreate` an existing worksheet is parked under a temporary name, a fresh one is
/// created under the original name, and only then is the parked one deleted, so the
/// workbook never runs out of worksheets. Without `recreate` the existing worksheet is
/// cleared in place and keeps its identity.
pub fn reset_worksheet<B: RemoteWorkbook>(workbook: &B, name: &str, recreate: bool) -> Result<B::Worksheet, RemoteError> {
    let info = match find_worksheet(workbook, name)? {
        Some(existing) if recreate => {
            let parked = temp_name(name);
            if worksheet_exists(workbook, &parked)? {
                delete_worksheet(workbook, &parked)?;
            }
            workbook.rename_worksheet(&existing.id, &parked)?;
            let info = create_worksheet(workbook, name)?;
            delete_worksheet(workbook, &parked)?;
            info
        }
        Some(existing) => {
            clear_used_range(workbook, name)?;
            existing
        }
        None => create_worksheet(workbook, name)?,
    };
    Ok(workbook.worksheet(&info))
}
