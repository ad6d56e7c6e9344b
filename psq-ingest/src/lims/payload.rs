//! Helpers for reading loosely shaped LIMS JSON

use serde_json::{Map, Value};

use crate::models::reading::number_text;

/// Scalar as identifier text
///
/// Integer-valued numbers lose any fractional ".0"; strings are trimmed.
/// Empty strings, booleans, null and containers yield `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(number_text)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// First alias whose value is present as scalar text
pub fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| object.get(*key).and_then(scalar_text))
}

/// Field as text, `None` when absent or not scalar
pub fn field_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(scalar_text)
}

/// Non-empty object under `key`
pub fn non_empty_object<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    object
        .get(key)
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
}
