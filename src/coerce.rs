//! Numeric coercion of untyped model values
//!
//! Total over every JSON value: anything that is not a number or a numeric
//! string degrades to `None`.

use serde_json::Value;

/// Coerce an untyped value into an optional float.
///
/// Booleans are rejected rather than cast to 0/1.
pub fn to_optional_float(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_str(s),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_numeric_str(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let stripped = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if stripped.is_empty() {
        return None;
    }

    // "inf" / "NaN" parse as f64 but are not amounts
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}
