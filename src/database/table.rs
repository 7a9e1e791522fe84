use serde::Serialize;
use serde::Serializer;
use std::fmt::Display;
use thiserror::Error;

/// Errors related to building an in-memory table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Row {row} has {actual} values but the table has {expected} columns")]
    RowWidth { row: usize, expected: usize, actual: usize },
}

/// A single scalar cell value as it is handed to a remote worksheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    /// Text values, including rendered dates and times
    Text(String),
    /// Any numeric value
    Number(f64),
    /// Boolean values (true/false)
    Boolean(bool),
    /// Missing or NULL value
    #[default]
    Empty,
}

impl CellValue {
    /// Returns true if this cell carries no value that can be sent to a worksheet.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(number) => !number.is_finite(),
            _ => false,
        }
    }

    /// Returns the cell itself, or an empty string cell when it is blank.
    pub fn or_blank(&self) -> CellValue {
        if self.is_blank() {
            CellValue::Text(String::new())
        } else {
            self.clone()
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Number(number) => write!(f, "{}", number),
            CellValue::Boolean(boolean) => write!(f, "{}", boolean),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl Serialize for CellValue {
    /// Blank cells serialize as an empty string; the workbook API rejects JSON nulls in values.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(text) => serializer.serialize_str(text),
            CellValue::Number(number) if number.is_finite() => serializer.serialize_f64(*number),
            CellValue::Boolean(boolean) => serializer.serialize_bool(*boolean),
            CellValue::Number(_) | CellValue::Empty => serializer.serialize_str(""),
        }
    }
}

/// An ordered set of named columns with position-aligned rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Column names, used as the header row
    columns: Vec<String>,
    /// Data rows, each exactly `columns.len()` wide
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Creates an empty table with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a data row, rejecting rows that don't match the column count.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len() + 1,
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of data rows, header excluded.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Replaces every missing or non-finite value with an empty string.
    pub fn fill_empty(&mut self) {
        for cell in self.rows.iter_mut().flatten() {
            if cell.is_blank() {
                *cell = CellValue::Text(String::new());
            }
        }
    }

    /// Returns the header row followed by all data rows, with blank cells replaced by empty strings.
    pub fn to_values(&self) -> Vec<Vec<CellValue>> {
        let header = self.columns.iter().map(|name| CellValue::Text(name.clone())).collect();
        std::iter::once(header)
            .chain(self.rows.iter().map(|row| row.iter().map(CellValue::or_blank).collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_checks_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![1.0.into(), "x".into()]).is_ok());

        let error = table.push_row(vec![CellValue::Empty]).unwrap_err();
        assert!(matches!(error, TableError::RowWidth { row: 2, expected: 2, actual: 1 }));
        assert_eq!(table.height(), 1);
    }

    #[test]
    fn fill_empty_replaces_nulls_and_nan() {
        let mut table = Table::new(["a", "b", "c"]);
        table.push_row(vec![CellValue::Empty, f64::NAN.into(), true.into()]).unwrap();
        table.push_row(vec![Option::<f64>::None.into(), 2.5.into(), "keep".into()]).unwrap();
        table.fill_empty();

        assert_eq!(table.rows()[0], vec!["".into(), "".into(), CellValue::Boolean(true)]);
        assert_eq!(table.rows()[1], vec!["".into(), CellValue::Number(2.5), "keep".into()]);
    }

    #[test]
    fn to_values_prepends_header() {
        let mut table = Table::new(["id", "name"]);
        table.push_row(vec![1i64.into(), CellValue::Empty]).unwrap();

        let values = table.to_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], vec!["id".into(), "name".into()]);
        assert_eq!(values[1], vec![CellValue::Number(1.0), "".into()]);
    }

    #[test]
    fn serialize_blank_as_empty_string() {
        let row = vec![
            CellValue::Empty,
            CellValue::Number(f64::INFINITY),
            CellValue::Number(3.0),
            CellValue::Boolean(false),
            CellValue::Text("x".to_owned()),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["","",3.0,false,"x"]"#);
    }
}
