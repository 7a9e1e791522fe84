//! Spreadsheet-style cell references: column labels and rectangular range addresses.

use crate::spreadsheet::SpreadsheetError;
use regex::Regex;
use std::fmt::Display;

/// Converts a 1-based column index to its alphabetic label (1 = "A", 27 = "AA").
/// Index 0 has no column and yields an empty label.
pub fn column_label(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    while n > 0 {
        let remainder = (n - 1) % 26;
        letters.push(b'A' + remainder as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&letter| letter as char).collect()
}

/// Converts an alphabetic column label back to its 1-based index.
/// Returns None for empty or non-alphabetic labels.
pub fn column_index(label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    label.chars().try_fold(0usize, |index, char| {
        let char = char.to_ascii_uppercase();
        char.is_ascii_uppercase()
            .then(|| index.checked_mul(26)?.checked_add((char as u8 - b'A' + 1) as usize))
            .flatten()
    })
}

/// A rectangular block of cells, 1-based and inclusive on both ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RangeAddress {
    pub col_start: usize,
    pub row_start: usize,
    pub col_end: usize,
    pub row_end: usize,
}

impl RangeAddress {
    /// Creates a range, rejecting inverted or zero-based bounds.
    pub fn new(col_start: usize, row_start: usize, col_end: usize, row_end: usize) -> Result<Self, SpreadsheetError> {
        let range = RangeAddress { col_start, row_start, col_end, row_end };
        if col_start == 0 || row_start == 0 || row_end < row_start || col_end < col_start {
            return Err(SpreadsheetError::InvalidRange(range.to_string()));
        }
        Ok(range)
    }

    /// Parses an address such as "A1:C5", "B2" or a sheet-qualified "'Sheet 1'!A1:C5".
    pub fn parse(address: &str) -> Result<Self, SpreadsheetError> {
        let pattern = Regex::new(r"^(?:.*!)?\$?([A-Za-z]+)\$?(\d+)(?::\$?([A-Za-z]+)\$?(\d+))?$")
            .expect("Hardcode regex pattern");
        let error = || SpreadsheetError::InvalidRange(address.to_owned());
        let captures = pattern.captures(address.trim()).ok_or_else(error)?;

        let col_start = column_index(&captures[1]).ok_or_else(error)?;
        let row_start = captures[2].parse::<usize>().map_err(|_| error())?;
        let col_end = captures
            .get(3)
            .map(|matcher| column_index(matcher.as_str()).ok_or_else(error))
            .transpose()?
            .unwrap_or(col_start);
        let row_end = captures
            .get(4)
            .map(|matcher| matcher.as_str().parse::<usize>().map_err(|_| error()))
            .transpose()?
            .unwrap_or(row_start);

        RangeAddress::new(col_start, row_start, col_end, row_end).map_err(|_| error())
    }

    /// Number of rows covered by this range.
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start + 1
    }

    /// Number of columns covered by this range.
    pub fn cols(&self) -> usize {
        self.col_end - self.col_start + 1
    }
}

impl Display for RangeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_label(self.col_start),
            self.row_start,
            column_label(self.col_end),
            self.row_end
        )
    }
}
