//! Field resolution over the open JSON mapping scanners emit.
//!
//! Every accessor tries a list of fallback key names in order and maps the
//! sentinel strings `"NaN"`, `"None"` and `""` (plus JSON null) to absence,
//! so calculators never see placeholder garbage. This is the only place that
//! knows about alternate key spellings.

use serde_json::Value;

/// First non-absent string value among the given keys, trimmed.
pub fn get_str<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        if let Some(value) = raw.get(key) {
            if let Some(s) = as_present_str(value) {
                return Some(s);
            }
        }
    }
    None
}

/// First parseable numeric value among the given keys.
///
/// Accepts JSON numbers and numeric strings; sentinel strings count as
/// absent rather than zero.
pub fn get_f64(raw: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match raw.get(key) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_f64() {
                    return Some(v);
                }
            }
            Some(Value::String(s)) => {
                if let Some(s) = present(s) {
                    if let Ok(v) = s.parse::<f64>() {
                        return Some(v);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// First boolean-ish value among the given keys. Absent keys and anything
/// unrecognized resolve to `false`, the neutral answer for flag fields.
pub fn get_bool(raw: &Value, keys: &[&str]) -> bool {
    for key in keys {
        match raw.get(key) {
            Some(Value::Bool(b)) => return *b,
            Some(Value::String(s)) => {
                let s = s.trim().to_ascii_lowercase();
                if s == "true" || s == "1" || s == "yes" {
                    return true;
                }
                if s == "false" || s == "0" || s == "no" {
                    return false;
                }
            }
            Some(Value::Number(n)) => return n.as_f64().is_some_and(|v| v != 0.0),
            _ => {}
        }
    }
    false
}

fn as_present_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => present(s),
        _ => None,
    }
}

fn present(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(s)
    }
}
