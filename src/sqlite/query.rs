use rusqlite::Statement;
use rusqlite::types::Value;

use super::params::Params;
use crate::error::DriverError;
use crate::executor::BufferedCursor;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `DriverError::SqliteError` if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, DriverError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Step a prepared statement to completion and buffer its rows into a cursor.
///
/// Every row is read before this returns; nothing is streamed from the statement afterwards.
///
/// A failure while binding or starting the statement is returned as an error. A failure
/// after rows have started arriving becomes the cursor's terminal error, so the rows read
/// before it are still delivered.
///
/// # Errors
///
/// Returns `DriverError` if the statement cannot be bound or started.
pub fn build_cursor(stmt: &mut Statement, params: &Params) -> Result<BufferedCursor, DriverError> {
    let param_refs = params.as_refs();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut rows = Vec::with_capacity(10);
    let mut terminal = None;

    loop {
        match rows_iter.next() {
            Ok(Some(row)) => {
                let mut row_values = Vec::with_capacity(col_count);
                let mut failed = None;
                for i in 0..col_count {
                    match sqlite_extract_value_sync(row, i) {
                        Ok(value) => row_values.push(value),
                        Err(e) => {
                            failed = Some(e);
                            break;
                        }
                    }
                }
                if let Some(e) = failed {
                    terminal = Some(e);
                    break;
                }
                rows.push(row_values);
            }
            Ok(None) => break,
            Err(e) => {
                terminal = Some(DriverError::from(e));
                break;
            }
        }
    }

    let cursor = BufferedCursor::new(column_names, rows);
    Ok(match terminal {
        Some(err) => cursor.with_terminal_error(err),
        None => cursor,
    })
}
