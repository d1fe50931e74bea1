//! Generic "row → typed record" construction pipeline, per §4.G.
//!
//! Grounded on `examples/original_source/commons/base_dataclasses.py` for
//! the five-table shape (FIELD_MAPPING/DEFAULTS/CONVERTERS/VALIDATORS/schema
//! keys). Two behaviors are spec-mandated additions not present in that
//! source file (SPEC_FULL.md §9 open question #2): the FIELD_MAPPING
//! conflict warning, and uniform strict-rethrow/lenient-drop validator
//! semantics.

use serde_json::{Map, Value};

pub type Converter = fn(Value) -> Result<Value, String>;
pub type Validator = fn(&Map<String, Value>) -> Result<(), String>;
pub type DefaultFn = fn() -> Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strictness {
    Strict,
    Lenient,
}

pub struct RecordDescriptor {
    pub name: &'static str,
    pub field_mapping: &'static [(&'static str, &'static str)],
    pub defaults: &'static [(&'static str, DefaultFn)],
    pub converters: &'static [(&'static str, Converter)],
    pub validators: &'static [Validator],
    pub schema_keys: &'static [&'static str],
}

#[derive(Debug)]
pub enum BuildError {
    Converter { field: &'static str, message: String },
    Validator(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Converter { field, message } => {
                write!(f, "converter for '{field}' failed: {message}")
            }
            BuildError::Validator(msg) => write!(f, "validator failed: {msg}"),
        }
    }
}
impl std::error::Error for BuildError {}

/// Builds one record from an external mapping. `Ok(None)` means the row was
/// dropped in lenient mode (validator failure); callers in strict mode only
/// ever see `Ok(Some(_))` or `Err(_)`.
pub fn build_record(
    raw: &Map<String, Value>,
    descriptor: &RecordDescriptor,
    mode: Strictness,
) -> Result<Option<Map<String, Value>>, BuildError> {
    let mut remapped: Map<String, Value> = Map::new();
    let mut set_from: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();

    for (ext_key, value) in raw.iter() {
        let internal_key = descriptor
            .field_mapping
            .iter()
            .find(|(e, _)| *e == ext_key)
            .map(|(_, i)| *i)
            .unwrap_or(ext_key.as_str());

        if let Some(prev_ext) = set_from.get(internal_key) {
            tracing::warn!(
                record = descriptor.name,
                internal_key,
                prev_external = prev_ext,
                new_external = ext_key.as_str(),
                "FIELD_MAPPING conflict: multiple external keys map to the same internal key, last one wins"
            );
        }
        set_from.insert(internal_key, ext_key.as_str());
        remapped.insert(internal_key.to_string(), value.clone());
    }

    for (key, default_fn) in descriptor.defaults {
        remapped.entry(key.to_string()).or_insert_with(default_fn);
    }

    for (key, converter) in descriptor.converters {
        if let Some(value) = remapped.get(*key).cloned() {
            match converter(value.clone()) {
                Ok(converted) => {
                    remapped.insert(key.to_string(), converted);
                }
                Err(msg) => match mode {
                    Strictness::Strict => {
                        return Err(BuildError::Converter { field: key, message: msg })
                    }
                    Strictness::Lenient => {
                        tracing::warn!(record = descriptor.name, field = *key, error = %msg, "converter failed, passing value through");
                    }
                },
            }
        }
    }

    for validator in descriptor.validators {
        if let Err(msg) = validator(&remapped) {
            match mode {
                Strictness::Strict => return Err(BuildError::Validator(msg)),
                Strictness::Lenient => {
                    tracing::warn!(record = descriptor.name, error = %msg, row = ?truncate_for_log(&remapped), "row failed validation, dropping");
                    return Ok(None);
                }
            }
        }
    }

    let mut out = Map::new();
    for key in descriptor.schema_keys {
        if let Some(v) = remapped.get(*key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    Ok(Some(out))
}

fn truncate_for_log(row: &Map<String, Value>) -> String {
    let s = serde_json::to_string(row).unwrap_or_default();
    s.chars().take(200).collect()
}

/// Constructs many records from a batch of raw mappings. Non-mapping items
/// (bare strings, arrays) are dropped with a warning in lenient mode, or
/// abort the whole batch in strict mode.
pub fn build_batch(
    raw_items: &[Value],
    descriptor: &RecordDescriptor,
    mode: Strictness,
) -> Result<Vec<Map<String, Value>>, BuildError> {
    let mut out = Vec::with_capacity(raw_items.len());
    for item in raw_items {
        let Some(obj) = item.as_object() else {
            match mode {
                Strictness::Strict => {
                    return Err(BuildError::Validator("batch item is not a mapping".into()))
                }
                Strictness::Lenient => {
                    tracing::warn!(record = descriptor.name, "dropping non-mapping batch item");
                    continue;
                }
            }
        };
        if let Some(record) = build_record(obj, descriptor, mode)? {
            out.push(record);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_zero() -> Value {
        json!(0)
    }

    fn conv_upper(v: Value) -> Result<Value, String> {
        v.as_str()
            .map(|s| json!(s.to_uppercase()))
            .ok_or_else(|| "not a string".into())
    }

    fn validate_nonneg(row: &Map<String, Value>) -> Result<(), String> {
        match row.get("n").and_then(Value::as_i64) {
            Some(n) if n < 0 => Err("n must be >= 0".into()),
            _ => Ok(()),
        }
    }

    const DESC: RecordDescriptor = RecordDescriptor {
        name: "test_record",
        field_mapping: &[("ext_name", "name"), ("alt_name", "name")],
        defaults: &[("n", default_zero as DefaultFn)],
        converters: &[("name", conv_upper as Converter)],
        validators: &[validate_nonneg as Validator],
        schema_keys: &["name", "n"],
    };

    #[test]
    fn field_mapping_conflict_last_wins() {
        let mut raw = Map::new();
        raw.insert("ext_name".into(), json!("first"));
        raw.insert("alt_name".into(), json!("second"));
        let out = build_record(&raw, &DESC, Strictness::Lenient).unwrap().unwrap();
        assert_eq!(out["name"], json!("SECOND"));
    }

    #[test]
    fn defaults_fill_in_missing_keys() {
        let mut raw = Map::new();
        raw.insert("ext_name".into(), json!("x"));
        let out = build_record(&raw, &DESC, Strictness::Lenient).unwrap().unwrap();
        assert_eq!(out["n"], json!(0));
    }

    #[test]
    fn lenient_validator_drops_row() {
        let mut raw = Map::new();
        raw.insert("ext_name".into(), json!("x"));
        raw.insert("n".into(), json!(-1));
        let out = build_record(&raw, &DESC, Strictness::Lenient).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn strict_validator_rethrows() {
        let mut raw = Map::new();
        raw.insert("ext_name".into(), json!("x"));
        raw.insert("n".into(), json!(-1));
        let out = build_record(&raw, &DESC, Strictness::Strict);
        assert!(out.is_err());
    }

    #[test]
    fn extras_are_discarded() {
        let mut raw = Map::new();
        raw.insert("ext_name".into(), json!("x"));
        raw.insert("unrelated".into(), json!("y"));
        let out = build_record(&raw, &DESC, Strictness::Lenient).unwrap().unwrap();
        assert!(!out.contains_key("unrelated"));
    }
}
</content>
