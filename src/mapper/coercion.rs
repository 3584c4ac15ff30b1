//! JSON to attribute value coercion.

use crate::core::{DataType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct CoercionError(String);

/// Converts loosely-typed payload values into typed attribute values.
pub struct ValueCoercer;

impl ValueCoercer {
    pub fn coerce(json_value: &JsonValue, expected_type: DataType) -> Result<Value, CoercionError> {
        match (json_value, expected_type) {
            (JsonValue::Null, _) => Ok(Value::Null),

            (v, DataType::Json) => Ok(Value::Json(v.clone())),

            // Boolean
            (JsonValue::Bool(b), DataType::Boolean) => Ok(Value::Boolean(*b)),
            (JsonValue::Number(n), DataType::Boolean) => match n.as_i64() {
                Some(0) => Ok(Value::Boolean(false)),
                Some(1) => Ok(Value::Boolean(true)),
                _ => Err(mismatch(json_value, expected_type)),
            },
            (JsonValue::String(s), DataType::Boolean) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Ok(Value::Boolean(true)),
                    "false" | "no" | "0" => Ok(Value::Boolean(false)),
                    _ => Err(mismatch(json_value, expected_type)),
                }
            }

            // Integer
            (JsonValue::Number(_) | JsonValue::String(_), DataType::Integer) => {
                primary_id_from_json(json_value)
                    .map(Value::Integer)
                    .ok_or_else(|| mismatch(json_value, expected_type))
            }

            // Float (accepts integers too)
            (JsonValue::Number(n), DataType::Float) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch(json_value, expected_type)),
            (JsonValue::String(s), DataType::Float) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(json_value, expected_type)),

            // Text: strings as-is, anything else rendered as JSON
            (JsonValue::String(s), DataType::Text) => Ok(Value::Text(s.clone())),
            (_, DataType::Text) => Ok(Value::Text(json_value.to_string())),

            // Timestamp: RFC 3339, naive UTC or unix seconds
            (JsonValue::String(s), DataType::Timestamp) => parse_timestamp(s)
                .map(Value::Timestamp)
                .ok_or_else(|| mismatch(json_value, expected_type)),
            (JsonValue::Number(n), DataType::Timestamp) => n
                .as_f64()
                .and_then(|secs| {
                    // Whole seconds round down so the fraction is never negative.
                    let whole = secs.floor();
                    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
                    let (whole, nanos) = if nanos >= 1_000_000_000 {
                        (whole + 1.0, 0)
                    } else {
                        (whole, nanos)
                    };
                    DateTime::from_timestamp(whole as i64, nanos)
                })
                .map(Value::Timestamp)
                .ok_or_else(|| mismatch(json_value, expected_type)),

            // Date
            (JsonValue::String(s), DataType::Date) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(s).map(|t| t.date_naive()))
                .map(Value::Date)
                .ok_or_else(|| mismatch(json_value, expected_type)),

            // UUID
            (JsonValue::String(s), DataType::Uuid) => uuid::Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|e| CoercionError(format!("Invalid UUID '{}': {}", s, e))),

            _ => Err(mismatch(json_value, expected_type)),
        }
    }
}

/// Read a primary id from a number (integral) or a numeric string.
pub fn primary_id_from_json(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Short name of a JSON value's kind for messages.
pub fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "record",
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn mismatch(json_value: &JsonValue, expected_type: DataType) -> CoercionError {
    CoercionError(format!(
        "Cannot convert JSON {} {} to {}",
        json_kind(json_value),
        json_value,
        expected_type
    ))
}
