//! Flat key-value documents stored as text.
//!
//! Variant selections and address snapshots are persisted as serialized JSON
//! objects in `TEXT` columns. This module is the single serialization
//! contract for those blobs: a map of string keys to string values, encoded
//! with sorted keys so that equal maps always produce identical text.

use std::collections::BTreeMap;

use serde_json::Value;

/// Errors that can occur when decoding a stored document.
#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    /// The text is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON value is not an object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    /// A value is an array or nested object.
    #[error("value for key {0:?} is not a scalar")]
    NestedValue(String),
}

/// Encode a map as canonical JSON text (keys sorted, no whitespace).
#[must_use]
pub fn encode(map: &BTreeMap<String, String>) -> String {
    // Serializing a BTreeMap<String, String> cannot fail.
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_owned())
}

/// Decode stored text into a flat map.
///
/// Scalars other than strings (numbers, booleans) are kept in their JSON text
/// form; `null` values are dropped. An empty or whitespace-only input decodes
/// to an empty map.
///
/// # Errors
///
/// Returns a [`DocumentError`] if the text is not a JSON object of scalars.
pub fn decode(text: &str) -> Result<BTreeMap<String, String>, DocumentError> {
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let value: Value = serde_json::from_str(text)?;
    let Value::Object(object) = value else {
        return Err(DocumentError::NotAnObject(kind(&value)));
    };

    let mut map = BTreeMap::new();
    for (key, value) in object {
        match value {
            Value::Null => {}
            Value::String(s) => {
                map.insert(key, s);
            }
            Value::Bool(b) => {
                map.insert(key, b.to_string());
            }
            Value::Number(n) => {
                map.insert(key, n.to_string());
            }
            Value::Array(_) | Value::Object(_) => return Err(DocumentError::NestedValue(key)),
        }
    }
    Ok(map)
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
