use serde_json::{Map, Value};

use crate::error::{EtlError, Result};

/// One raw or parsed document: a flat (or soon-to-be-flat) JSON object.
pub type Record = Map<String, Value>;

/// Timestamps are stored as TEXT in this format, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert an externally-cased key to snake_case: an underscore goes in
/// front of every uppercase letter, then everything is lowercased and a
/// leading underscore is trimmed (`_id` becomes `id`). Idempotent.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out.trim_start_matches('_').to_string()
}

/// Replace each named field present in the record with its float conversion.
/// Numbers pass through, numeric strings are parsed. Anything else is a
/// fatal type error naming the field.
pub fn coerce_floats(record: &mut Record, fields: &[&str]) -> Result<()> {
    for &field in fields {
        let Some(value) = record.get(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let number = parsed.and_then(serde_json::Number::from_f64);
        match number {
            Some(n) => {
                record.insert(field.to_string(), Value::Number(n));
            }
            None => {
                return Err(EtlError::BadNumber {
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Replace each named field present in the record with an absolute UTC
/// timestamp string, unwrapping the document store's `{"$date": <epoch>}`
/// convention. Epochs are divided by 1000 when `in_milliseconds` is set.
pub fn coerce_dates(record: &mut Record, fields: &[&str], in_milliseconds: bool) -> Result<()> {
    for &field in fields {
        let Some(value) = record.get(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let epoch = value
            .get("$date")
            .and_then(|d| d.as_i64().or_else(|| d.as_f64().map(|f| f as i64)));
        let Some(epoch) = epoch else {
            return Err(EtlError::BadTimestamp {
                field: field.to_string(),
                value: value.to_string(),
            });
        };
        let timestamp = if in_milliseconds {
            chrono::DateTime::from_timestamp_millis(epoch)
        } else {
            chrono::DateTime::from_timestamp(epoch, 0)
        };
        let Some(timestamp) = timestamp else {
            return Err(EtlError::BadTimestamp {
                field: field.to_string(),
                value: value.to_string(),
            });
        };
        record.insert(
            field.to_string(),
            Value::String(timestamp.format(TIMESTAMP_FORMAT).to_string()),
        );
    }
    Ok(())
}
