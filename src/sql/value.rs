//! Conversion of database rows into ordered JSON maps

use base64::Engine;
use indexmap::IndexMap;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// One result row: column name → value, in the order the query declared the columns
pub type Row = IndexMap<String, Value>;

/// Decode every column of a row
pub fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut decoded = IndexMap::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = decode_value(row, column.ordinal())?;
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

/// Decode a single column by the storage class of the value itself.
///
/// SQLite is dynamically typed, so the declared column type is only a hint;
/// the value's own type decides the JSON shape.
fn decode_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "NUMERIC" => {
            let number = row.try_get_unchecked::<f64, _>(index)?;
            serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            Value::String(format!(
                "base64:{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ))
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(value)
}

/// Render rows as compact JSON lines for the model, capped at `max_rows`
pub fn render_rows(rows: &[Row], max_rows: usize) -> String {
    if rows.is_empty() {
        return "Query returned no rows.".to_string();
    }

    let mut out = format!("{} row(s):\n", rows.len());
    for row in rows.iter().take(max_rows) {
        out.push_str(&serde_json::to_string(row).unwrap_or_default());
        out.push('\n');
    }
    if rows.len() > max_rows {
        out.push_str(&format!("... and {} more rows\n", rows.len() - max_rows));
    }
    out
}
