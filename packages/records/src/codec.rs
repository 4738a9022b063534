//! Flattening between domain structs and flat records.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::store::{Record, RecordError};

/// Serialize `value` into a flat record. Columns named in `structured`, and
/// any other nested value, are stored as JSON text. A structured `null` is
/// stored as the text `null`, so it stays distinct from a cleared column.
pub(crate) fn to_record<T: Serialize>(value: &T, structured: &[&str]) -> Result<Record, RecordError> {
    let Value::Object(map) = serde_json::to_value(value)? else {
        return Err(RecordError::NotARecord);
    };
    Ok(map
        .into_iter()
        .map(|(column, value)| {
            let nested = value.is_object() || value.is_array();
            if nested || structured.contains(&column.as_str()) {
                (column, Value::String(value.to_string()))
            } else {
                (column, value)
            }
        })
        .collect())
}

/// Reverse of [`to_record`].
pub(crate) fn from_record<T: DeserializeOwned>(
    mut record: Record,
    structured: &[&str],
) -> Result<T, RecordError> {
    for column in structured {
        match record.remove(*column) {
            Some(Value::String(text)) => {
                let parsed: Value = serde_json::from_str(&text)?;
                record.insert((*column).to_string(), parsed);
            }
            // a raw null is a cleared column
            Some(Value::Null) | None => {}
            Some(other) => {
                record.insert((*column).to_string(), other);
            }
        }
    }
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Columns held by `existing` but missing from `fresh`, set to null so an
/// update replaces the whole row.
pub(crate) fn replacing(existing: &Record, mut fresh: Record) -> Record {
    for column in existing.keys() {
        if !fresh.contains_key(column) {
            fresh.insert(column.clone(), Value::Null);
        }
    }
    fresh
}
