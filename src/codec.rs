//! Conversion of loosely typed records into insertable form.
//!
//! Inserts never interpolate values into SQL: [`bind`] hands the checked
//! values to a prepared statement. [`encode`] renders the same record as an
//! escaped literal tuple and is only used for diagnostics.

use crate::error::{Result, StoreError};
use crate::value::{Record, Value};
use rusqlite::ToSql;

/// Reject any value that is neither text nor integer.
pub fn check_insertable(value: &Value) -> Result<()> {
    match value {
        Value::Text(_) | Value::Integer(_) => Ok(()),
        other => Err(StoreError::UnsupportedType {
            type_name: other.type_name(),
        }),
    }
}

/// Render a record as a literal tuple, e.g. `('A','B',1,2)`.
///
/// Embedded single quotes are doubled.
pub fn encode(record: &Record) -> Result<String> {
    let mut parts = Vec::with_capacity(record.len());
    for value in record.values() {
        parts.push(match value {
            Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
            Value::Integer(number) => number.to_string(),
            other => {
                return Err(StoreError::UnsupportedType {
                    type_name: other.type_name(),
                })
            }
        });
    }
    Ok(format!("({})", parts.join(",")))
}

/// Check every value and return them as positional statement parameters.
pub fn bind(record: &Record) -> Result<Vec<&dyn ToSql>> {
    record
        .values()
        .iter()
        .map(|value| {
            check_insertable(value)?;
            Ok(value as &dyn ToSql)
        })
        .collect()
}
