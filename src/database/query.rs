//! Loads the result of a SQL query into an in-memory [`Table`].

use crate::database::table::CellValue;
use crate::database::table::Table;
use crate::error::ExportError;
use crate::error::ResultMessage;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveTime;
use duckdb::types::TimeUnit;
use duckdb::types::Value;
use duckdb::Connection;
use std::path::Path;
use tracing::debug;
use tracing::info;

/// Opens a DuckDB database (in memory when no path is given) and runs the init statements in order.
///
/// Init statements are typically `INSTALL`/`LOAD`/`ATTACH` commands that expose an
/// external relational database to the export query.
pub fn open_connection(database: Option<&Path>, init_sql: &[String]) -> Result<Connection, ExportError> {
    let connection = match database {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };
    for statement in init_sql {
        debug!(statement = statement.as_str(), "running init statement");
        connection
            .execute_batch(statement)
            .map_err(ExportError::from)
            .with_prefix("Init statement failed")?;
    }
    Ok(connection)
}

/// Runs a query and loads every row of its result into a table.
pub fn query_table(connection: &Connection, sql: &str) -> Result<Table, ExportError> {
    let mut statement = connection.prepare(sql)?;
    let mut rows = statement.query([])?;
    let columns = rows
        .as_ref()
        .map(|statement| statement.column_names())
        .unwrap_or_default();
    let width = columns.len();

    let mut table = Table::new(columns);
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(width);
        for index in 0..width {
            let value: Value = row.get(index)?;
            record.push(to_cell_value(value));
        }
        table.push_row(record)?;
    }

    info!(rows = table.height(), columns = table.width(), "query loaded");
    Ok(table)
}

/// Maps a DuckDB value onto the closed set of cell variants.
fn to_cell_value(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Boolean(value) => CellValue::Boolean(value),
        Value::TinyInt(value) => CellValue::Number(value.into()),
        Value::SmallInt(value) => CellValue::Number(value.into()),
        Value::Int(value) => CellValue::Number(value.into()),
        Value::BigInt(value) => CellValue::Number(value as f64),
        Value::HugeInt(value) => CellValue::Number(value as f64),
        Value::UTinyInt(value) => CellValue::Number(value.into()),
        Value::USmallInt(value) => CellValue::Number(value.into()),
        Value::UInt(value) => CellValue::Number(value.into()),
        Value::UBigInt(value) => CellValue::Number(value as f64),
        Value::Float(value) => CellValue::Number(value.into()),
        Value::Double(value) => CellValue::Number(value),
        Value::Decimal(value) => {
            let text = value.to_string();
            text.parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Text(text))
        }
        Value::Text(value) | Value::Enum(value) => CellValue::Text(value),
        Value::Date32(days) => format_date(days),
        Value::Time64(unit, value) => format_time(&unit, value),
        Value::Timestamp(unit, value) => format_timestamp(&unit, value),
        other => CellValue::Text(format!("{:?}", other)),
    }
}

/// Renders days since the Unix epoch as `YYYY-MM-DD`.
fn format_date(days: i32) -> CellValue {
    let text = match days {
        i32::MAX => "infinity".to_owned(),
        days if days == -i32::MAX => "-infinity".to_owned(),
        days => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format!("{:?}", Value::Date32(days))),
    };
    CellValue::Text(text)
}

/// Renders time of day as `HH:MM:SS`.
fn format_time(unit: &TimeUnit, value: i64) -> CellValue {
    let text = to_micros(unit, value)
        .and_then(|micros| {
            let seconds = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
            let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
            NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos)
        })
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| value.to_string());
    CellValue::Text(text)
}

/// Renders a point in time as `YYYY-MM-DD HH:MM:SS`; DuckDB's infinities keep their names.
fn format_timestamp(unit: &TimeUnit, value: i64) -> CellValue {
    let text = match value {
        i64::MAX => "infinity".to_owned(),
        value if value == -i64::MAX => "-infinity".to_owned(),
        value => to_micros(unit, value)
            .and_then(DateTime::from_timestamp_micros)
            .map(|datetime| datetime.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| value.to_string()),
    };
    CellValue::Text(text)
}

/// Converts a DuckDB temporal value to microseconds, `None` when it doesn't fit.
fn to_micros(unit: &TimeUnit, value: i64) -> Option<i64> {
    match unit {
        TimeUnit::Second => value.checked_mul(1_000_000),
        TimeUnit::Millisecond => value.checked_mul(1_000),
        TimeUnit::Microsecond => Some(value),
        TimeUnit::Nanosecond => Some(value / 1_000),
    }
}
