//! Shared converters used by several record descriptors (§4.G).
//!
//! Grounded on `examples/original_source/commons/normalizers.py`: same
//! heuristics (empty-string coercion, ms-vs-seconds timestamp threshold,
//! truthy/falsy token sets), expressed over `serde_json::Value` since that's
//! the generic mapping type the record pipeline operates on.

use serde_json::Value;

const MS_THRESHOLD: i64 = 1_000_000_000_000; // 10^12

/// Empty/whitespace-only strings become `Null` ("absent"); everything else passes through.
pub fn empty_to_absent(v: Value) -> Value {
    match v {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        other => other,
    }
}

/// Best-effort integer coercion; non-numeric and empty values become "absent".
pub fn to_numeric_or_absent(v: Value) -> Value {
    match v {
        Value::Null => Value::Null,
        Value::Number(n) => Value::Number(n),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                s.parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| s.parse::<f64>().map(Value::from))
                    .unwrap_or(Value::Null)
            }
        }
        _ => Value::Null,
    }
}

/// Best-effort float coercion; non-numeric and empty values become "absent".
pub fn to_float_or_absent(v: Value) -> Value {
    match v {
        Value::Null => Value::Null,
        Value::Number(n) => Value::from(n.as_f64().unwrap_or_default()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                s.parse::<f64>().map(Value::from).unwrap_or(Value::Null)
            }
        }
        _ => Value::Null,
    }
}

const TRUTHY: &[&str] = &["1", "true", "yes", "y"];
const FALSY: &[&str] = &["0", "false", "no", "n"];

/// Parses the truthy/falsy token sets from §3; anything else is "absent".
pub fn to_bool_or_none(v: Value) -> Value {
    let token = match &v {
        Value::Bool(b) => return Value::Bool(*b),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_lowercase(),
        _ => return Value::Null,
    };
    if TRUTHY.contains(&token.as_str()) {
        Value::Bool(true)
    } else if FALSY.contains(&token.as_str()) {
        Value::Bool(false)
    } else {
        Value::Null
    }
}

/// Heuristic: values `>= 10^12` are treated as milliseconds and divided down to seconds.
/// Accepts numeric strings too.
pub fn ts_to_seconds(v: Value) -> Value {
    let num = match &v {
        Value::Null => return Value::Null,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
        }
        _ => None,
    };
    match num {
        None => Value::Null,
        Some(n) if n.abs() >= MS_THRESHOLD => Value::from(n / 1000),
        Some(n) => Value::from(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ts_seconds_passes_through() {
        assert_eq!(ts_to_seconds(json!(1_700_000_000)), json!(1_700_000_000));
    }

    #[test]
    fn ts_millis_divided_down() {
        assert_eq!(ts_to_seconds(json!(1_700_000_000_000i64)), json!(1_700_000_000));
    }

    #[test]
    fn empty_string_is_absent() {
        assert_eq!(empty_to_absent(json!("   ")), Value::Null);
        assert_eq!(empty_to_absent(json!("x")), json!("x"));
    }

    #[test]
    fn bool_tokens() {
        assert_eq!(to_bool_or_none(json!("Yes")), json!(true));
        assert_eq!(to_bool_or_none(json!("n")), json!(false));
        assert_eq!(to_bool_or_none(json!("maybe")), Value::Null);
    }
}
</content>
