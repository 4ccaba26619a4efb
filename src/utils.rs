//! JSON scalar normalization shared by the ingestion boundary.

use serde_json::{Map, Value};

/// Render a JSON scalar as a trimmed identifier string.
///
/// Strings are trimmed; integral numbers are rendered without a fractional
/// part. Everything else (null, bools, arrays, objects) yields `None`, as do
/// values that trim to the empty string.
pub fn scalar_to_id(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => match number.as_u64() {
            Some(unsigned) => unsigned.to_string(),
            None => number.to_string(),
        },
        _ => return None,
    };
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Return the first non-empty identifier among `aliases`, in order.
pub fn first_present(object: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| object.get(*alias))
        .find_map(scalar_to_id)
}
