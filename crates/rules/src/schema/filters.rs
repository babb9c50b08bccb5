//! Field=value matching shared by query adapters.

use serde_json::Value;

/// Whether a filter value is a scalar usable in a term match.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Compare a record field against a filter value.
///
/// Scalars compare by their textual form so `status_code: "404"` in a rule
/// still matches a numeric `404` in the record.
pub fn value_matches(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Render a scalar as the string used for group keys.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
