//! Writes an in-memory table into a remote worksheet as a series of bounded range updates.

use crate::database::table::Table;
use crate::remote::RemoteWorksheet;
use crate::spreadsheet::chunk::ChunkPlan;
use crate::spreadsheet::reference::RangeAddress;
use crate::spreadsheet::SpreadsheetError;
use tracing::debug;
use tracing::info;

/// Writes the header row and all data rows of `table` into `sheet`, starting at `A1`.
///
/// Rows are sent in spans of at most `chunk_size` rows so every request stays below the
/// service's payload ceiling. Spans are written in order; the first failing span aborts
/// the write and later spans are not attempted, so the sheet keeps the spans already sent.
///
/// A table without columns has nothing addressable and issues no write at all.
pub fn write_table<W: RemoteWorksheet>(sheet: &W, table: &Table, chunk_size: usize) -> Result<(), SpreadsheetError> {
    let total_rows = table.height() + 1;
    let plan = ChunkPlan::new(total_rows, chunk_size)?;
    let width = table.width();
    if width == 0 {
        debug!(sheet = sheet.name(), "table has no columns, nothing to write");
        return Ok(());
    }

    let data = table.to_values();
    for span in plan {
        let address = RangeAddress::new(1, span.start, width, span.end)?;
        debug!(sheet = sheet.name(), range = %address, "writing chunk");
        sheet
            .set_range(&address, &data[span.as_slice_range()])
            .map_err(|source| SpreadsheetError::RangeWrite { address: address.to_string(), source })?;
    }

    info!(sheet = sheet.name(), rows = total_rows, columns = width, chunks = plan.len(), "table written");
    Ok(())
}
