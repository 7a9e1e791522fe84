//! In-memory drive and workbook used by tests; records every call it receives.

use crate::database::table::CellValue;
use crate::helpers::xlsx::MAX_SHEET_NAME_CHARS;
use crate::remote::DriveItem;
use crate::remote::RemoteDrive;
use crate::remote::RemoteError;
use crate::remote::RemoteWorkbook;
use crate::remote::RemoteWorksheet;
use crate::remote::WorksheetInfo;
use crate::spreadsheet::reference::RangeAddress;
use regex::Regex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Cursor;
use std::io::Read;
use std::rc::Rc;
use zip::ZipArchive;

/// Rejects names the workbook service refuses.
fn check_sheet_name(name: &str) -> Result<(), RemoteError> {
    if name.chars().count() > MAX_SHEET_NAME_CHARS {
        return Err(RemoteError::Api {
            status: 400,
            code: "InvalidArgument".to_owned(),
            message: format!("Worksheet name '{}' is too long", name),
        });
    }
    Ok(())
}

/// One recorded remote call.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    SetRange { sheet: String, address: String },
    UsedRange { sheet: String },
    ClearRange { sheet: String, address: String },
    AutoFit { sheet: String, address: String },
    AddWorksheet { name: String },
    DeleteWorksheet { name: String },
    RenameWorksheet { from: String, to: String },
    Upload { path: String },
}

struct MemorySheet {
    info: WorksheetInfo,
    cells: BTreeMap<(usize, usize), CellValue>,
}

#[derive(Default)]
struct MemoryState {
    sheets: Vec<MemorySheet>,
    calls: Vec<Call>,
    next_id: usize,
    writes: usize,
    fail_write_at: Option<usize>,
    min_sheet_count: Option<usize>,
}

impl MemoryState {
    fn sheet(&self, id: &str) -> Result<&MemorySheet, RemoteError> {
        self.sheets
            .iter()
            .find(|sheet| sheet.info.id == id)
            .ok_or_else(|| RemoteError::WorksheetNotFound { name: id.to_owned() })
    }

    fn sheet_mut(&mut self, id: &str) -> Result<&mut MemorySheet, RemoteError> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.info.id == id)
            .ok_or_else(|| RemoteError::WorksheetNotFound { name: id.to_owned() })
    }

    fn track_sheet_count(&mut self) {
        let count = self.sheets.len();
        self.min_sheet_count = Some(self.min_sheet_count.map_or(count, |min| min.min(count)));
    }
}

/// A workbook whose sheets live in memory.
#[derive(Clone, Default)]
pub(crate) struct MemoryWorkbook {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryWorkbook {
    pub(crate) fn with_sheets(names: &[&str]) -> Self {
        let workbook = MemoryWorkbook::default();
        {
            let mut state = workbook.state.borrow_mut();
            for name in names {
                state.next_id += 1;
                let info = WorksheetInfo { id: format!("{{{}}}", state.next_id), name: name.to_string() };
                state.sheets.push(MemorySheet { info, cells: BTreeMap::new() });
            }
        }
        workbook
    }

    /// Makes the n-th (1-based) `set_range` call fail.
    pub(crate) fn fail_write_at(&self, nth: usize) {
        self.state.borrow_mut().fail_write_at = Some(nth);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub(crate) fn sheet_names(&self) -> Vec<String> {
        self.state.borrow().sheets.iter().map(|sheet| sheet.info.name.clone()).collect()
    }

    pub(crate) fn sheet_id(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .sheets
            .iter()
            .find(|sheet| sheet.info.name == name)
            .map(|sheet| sheet.info.id.clone())
    }

    /// Smallest number of worksheets the workbook held after any call.
    pub(crate) fn min_sheet_count(&self) -> Option<usize> {
        self.state.borrow().min_sheet_count
    }

    /// Returns the value stored at a 1-based cell position of the named sheet.
    pub(crate) fn cell(&self, sheet: &str, row: usize, col: usize) -> Option<CellValue> {
        let state = self.state.borrow();
        let sheet = state.sheets.iter().find(|it| it.info.name == sheet)?;
        sheet.cells.get(&(row, col)).cloned()
    }

    /// Returns every stored cell value of the named sheet.
    pub(crate) fn cells(&self, sheet: &str) -> Vec<CellValue> {
        let state = self.state.borrow();
        state
            .sheets
            .iter()
            .find(|it| it.info.name == sheet)
            .map(|sheet| sheet.cells.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn put_cell(&self, sheet: &str, row: usize, col: usize, value: CellValue) {
        let mut state = self.state.borrow_mut();
        if let Some(sheet) = state.sheets.iter_mut().find(|it| it.info.name == sheet) {
            sheet.cells.insert((row, col), value);
        }
    }
}

impl RemoteWorkbook for MemoryWorkbook {
    type Worksheet = MemoryWorksheet;

    fn list_worksheets(&self) -> Result<Vec<WorksheetInfo>, RemoteError> {
        Ok(self.state.borrow().sheets.iter().map(|sheet| sheet.info.clone()).collect())
    }

    fn add_worksheet(&self, name: &str) -> Result<WorksheetInfo, RemoteError> {
        check_sheet_name(name)?;
        let mut state = self.state.borrow_mut();
        if state.sheets.iter().any(|sheet| sheet.info.name == name) {
            return Err(RemoteError::Api {
                status: 409,
                code: "ItemAlreadyExists".to_owned(),
                message: format!("A worksheet named '{}' already exists", name),
            });
        }
        state.next_id += 1;
        let info = WorksheetInfo { id: format!("{{{}}}", state.next_id), name: name.to_owned() };
        state.sheets.push(MemorySheet { info: info.clone(), cells: BTreeMap::new() });
        state.calls.push(Call::AddWorksheet { name: name.to_owned() });
        state.track_sheet_count();
        Ok(info)
    }

    fn delete_worksheet(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        let name = state.sheet(id)?.info.name.clone();
        if state.sheets.len() == 1 {
            return Err(RemoteError::Api {
                status: 400,
                code: "InvalidArgument".to_owned(),
                message: "A workbook must contain at least one visible worksheet".to_owned(),
            });
        }
        state.sheets.retain(|sheet| sheet.info.id != id);
        state.calls.push(Call::DeleteWorksheet { name });
        state.track_sheet_count();
        Ok(())
    }

    fn rename_worksheet(&self, id: &str, new_name: &str) -> Result<(), RemoteError> {
        check_sheet_name(new_name)?;
        let mut state = self.state.borrow_mut();
        let sheet = state.sheet_mut(id)?;
        let from = std::mem::replace(&mut sheet.info.name, new_name.to_owned());
        state.calls.push(Call::RenameWorksheet { from, to: new_name.to_owned() });
        Ok(())
    }

    fn worksheet(&self, info: &WorksheetInfo) -> MemoryWorksheet {
        MemoryWorksheet {
            id: info.id.clone(),
            name: info.name.clone(),
            state: self.state.clone(),
        }
    }
}

/// Handle to one sheet of a [`MemoryWorkbook`].
pub(crate) struct MemoryWorksheet {
    id: String,
    name: String,
    state: Rc<RefCell<MemoryState>>,
}

impl RemoteWorksheet for MemoryWorksheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_range(&self, address: &RangeAddress, values: &[Vec<CellValue>]) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        state.calls.push(Call::SetRange { sheet: self.name.clone(), address: address.to_string() });
        if state.fail_write_at == Some(state.writes) {
            return Err(RemoteError::Api {
                status: 429,
                code: "TooManyRequests".to_owned(),
                message: "Rate limit exceeded".to_owned(),
            });
        }
        if values.len() != address.rows() || values.iter().any(|row| row.len() != address.cols()) {
            return Err(RemoteError::Api {
                status: 400,
                code: "InvalidArgument".to_owned(),
                message: format!("Values don't match the shape of {}", address),
            });
        }
        let sheet = state.sheet_mut(&self.id)?;
        for (row_offset, row) in values.iter().enumerate() {
            for (col_offset, value) in row.iter().enumerate() {
                let position = (address.row_start + row_offset, address.col_start + col_offset);
                sheet.cells.insert(position, value.clone());
            }
        }
        Ok(())
    }

    fn used_range(&self) -> Result<RangeAddress, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::UsedRange { sheet: self.name.clone() });
        let sheet = state.sheet(&self.id)?;
        let rows = sheet.cells.keys().map(|(row, _)| *row);
        let cols = sheet.cells.keys().map(|(_, col)| *col);
        let range = match (rows.clone().min(), rows.max(), cols.clone().min(), cols.max()) {
            (Some(row_start), Some(row_end), Some(col_start), Some(col_end)) => {
                RangeAddress { col_start, row_start, col_end, row_end }
            }
            _ => RangeAddress { col_start: 1, row_start: 1, col_end: 1, row_end: 1 },
        };
        Ok(range)
    }

    fn clear_range(&self, address: &RangeAddress) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::ClearRange { sheet: self.name.clone(), address: address.to_string() });
        let sheet = state.sheet_mut(&self.id)?;
        sheet.cells.retain(|(row, col), _| {
            !(address.row_start..=address.row_end).contains(row)
                || !(address.col_start..=address.col_end).contains(col)
        });
        Ok(())
    }

    fn auto_fit_columns(&self, address: &RangeAddress) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::AutoFit { sheet: self.name.clone(), address: address.to_string() });
        Ok(())
    }
}

/// A drive holding workbook files in memory.
#[derive(Default)]
pub(crate) struct MemoryDrive {
    items: RefCell<HashMap<String, (DriveItem, MemoryWorkbook)>>,
    uploads: RefCell<Vec<Call>>,
}

impl MemoryDrive {
    pub(crate) fn insert(&self, path: &str, workbook: MemoryWorkbook) {
        let name = path.rsplit('/').next().unwrap_or(path).to_owned();
        let item = DriveItem { id: format!("item-{}", name), name };
        self.items.borrow_mut().insert(path.to_owned(), (item, workbook));
    }

    pub(crate) fn workbook(&self, path: &str) -> Option<MemoryWorkbook> {
        self.items.borrow().get(path).map(|(_, workbook)| workbook.clone())
    }

    pub(crate) fn uploads(&self) -> Vec<Call> {
        self.uploads.borrow().clone()
    }
}

/// Reads worksheet names out of an uploaded `.xlsx` package.
fn sheet_names_of(content: &[u8]) -> Vec<String> {
    let mut workbook_xml = String::new();
    let Ok(mut archive) = ZipArchive::new(Cursor::new(content)) else {
        return Vec::new();
    };
    match archive.by_name("xl/workbook.xml") {
        Ok(mut file) => {
            if file.read_to_string(&mut workbook_xml).is_err() {
                return Vec::new();
            }
        }
        Err(_) => return Vec::new(),
    }
    let pattern = Regex::new(r#"<sheet name="([^"]*)""#).expect("Hardcode regex pattern");
    pattern
        .captures_iter(&workbook_xml)
        .map(|captures| quick_xml::escape::unescape(&captures[1]).map(|name| name.into_owned()).unwrap_or_default())
        .collect()
}

impl RemoteDrive for MemoryDrive {
    type Workbook = MemoryWorkbook;

    fn id(&self) -> &str {
        "memory-drive"
    }

    fn get_item_by_path(&self, path: &str) -> Result<DriveItem, RemoteError> {
        self.items
            .borrow()
            .get(path)
            .map(|(item, _)| item.clone())
            .ok_or_else(|| RemoteError::ItemNotFound { path: path.to_owned() })
    }

    fn upload_file(&self, path: &str, content: Vec<u8>) -> Result<DriveItem, RemoteError> {
        let names = sheet_names_of(&content);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.insert(path, MemoryWorkbook::with_sheets(&names));
        self.uploads.borrow_mut().push(Call::Upload { path: path.to_owned() });
        self.get_item_by_path(path)
    }

    fn open_workbook(&self, item: &DriveItem) -> Result<MemoryWorkbook, RemoteError> {
        self.items
            .borrow()
            .values()
            .find(|(it, _)| it.id == item.id)
            .map(|(_, workbook)| workbook.clone())
            .ok_or_else(|| RemoteError::ItemNotFound { path: item.name.clone() })
    }

    fn list_root_folders(&self) -> Result<Vec<DriveItem>, RemoteError> {
        Ok(Vec::new())
    }
}
