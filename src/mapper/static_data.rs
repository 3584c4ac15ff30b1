//! Static/reference data arrives as a header row followed by positional rows:
//!
//! ```json
//! [["id", "name"], [1, "Low"], [2, "High"]]
//! ```
//!
//! which is reshaped into the regular record form before mapping.

use super::coercion::json_kind;
use crate::core::{MapError, Record, Result};
use serde_json::Value as JsonValue;

/// Reshape header-plus-rows static data into records.
///
/// A payload whose first element is already a record is passed through
/// unchanged, provided every element is a record.
pub fn reshape_static_data(payload: &JsonValue) -> Result<Vec<Record>> {
    let items = payload.as_array().ok_or_else(|| {
        MapError::PayloadShape(format!(
            "static data must be a sequence, got {}",
            json_kind(payload)
        ))
    })?;

    let Some(first) = items.first() else {
        return Ok(Vec::new());
    };

    match first {
        JsonValue::Array(header) => {
            let columns = header_columns(header)?;
            items[1..]
                .iter()
                .enumerate()
                .map(|(i, row)| zip_row(&columns, row, i + 1))
                .collect()
        }
        JsonValue::Object(_) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_object().cloned().ok_or_else(|| {
                    MapError::PayloadShape(format!(
                        "element {} is a {}, expected a record",
                        i,
                        json_kind(item)
                    ))
                })
            })
            .collect(),
        other => Err(MapError::PayloadShape(format!(
            "static data header must be a sequence of field names, got {}",
            json_kind(other)
        ))),
    }
}

fn header_columns(header: &[JsonValue]) -> Result<Vec<&str>> {
    header
        .iter()
        .enumerate()
        .map(|(i, column)| {
            column.as_str().ok_or_else(|| {
                MapError::PayloadShape(format!(
                    "header column {} is a {}, expected a field name",
                    i,
                    json_kind(column)
                ))
            })
        })
        .collect()
}

fn zip_row(columns: &[&str], row: &JsonValue, position: usize) -> Result<Record> {
    let values = row.as_array().ok_or_else(|| {
        MapError::PayloadShape(format!(
            "row {} is a {}, expected a sequence of values",
            position,
            json_kind(row)
        ))
    })?;

    if values.len() != columns.len() {
        return Err(MapError::PayloadShape(format!(
            "row {} has {} values but the header has {} columns",
            position,
            values.len(),
            columns.len()
        )));
    }

    Ok(columns
        .iter()
        .zip(values)
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect())
}
