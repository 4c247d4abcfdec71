//! # Deep Merge
//!
//! Option composition (defaults, config file, per-call overrides) all goes
//! through [`merge`]. The rules:
//!
//! ```text
//! incoming value          target slot          result
//! ─────────────────────   ──────────────────   ─────────────────────────────
//! null / bool / number    anything             overwrite
//! array                   anything             fresh element-wise copy
//! bytes / date / pattern  anything             type-specific copy
//! object                  object               merge in place, recursively
//! object                  anything else        fresh deep copy, overwrite
//! ```
//!
//! Sources are only read. Pass `Value::object()` as the target to build a
//! merged copy without touching any of the inputs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;

pub type Map = BTreeMap<String, Value>;

/// Dynamic option tree.
///
/// A superset of JSON: besides the JSON kinds it carries binary buffers,
/// timestamps and compiled patterns, which are always copied by type.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(Map),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
    Pattern(Regex),
}

impl Value {
    /// An empty object, the usual merge target.
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Bytes, dates and patterns.
    pub fn is_specific(&self) -> bool {
        matches!(self, Value::Bytes(_) | Value::Date(_) | Value::Pattern(_))
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Pattern(a), Value::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Lossy for the specific kinds: bytes become a number array, dates an
/// RFC 3339 string, patterns their source text.
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.into_iter().map(|b| serde_json::Value::from(b)).collect(),
            ),
            Value::Date(date) => serde_json::Value::String(date.to_rfc3339()),
            Value::Pattern(re) => serde_json::Value::String(re.as_str().to_string()),
        }
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

fn clone_specific(value: &Value) -> Value {
    match value {
        Value::Bytes(bytes) => Value::Bytes(bytes.to_vec()),
        Value::Date(date) => Value::Date(*date),
        Value::Pattern(re) => Value::Pattern(re.clone()),
        other => other.clone(),
    }
}

fn deep_clone_array(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .map(|item| match item {
            Value::Array(inner) => Value::Array(deep_clone_array(inner)),
            Value::Object(_) => {
                let mut fresh = Value::object();
                merge(&mut fresh, &[item]);
                fresh
            }
            specific if specific.is_specific() => clone_specific(specific),
            other => other.clone(),
        })
        .collect()
}

/// Merges every object in `sources` into `target`, left to right.
///
/// Returns `None` (nothing merged) when `target` is not an object. With no
/// sources the target comes back untouched. Non-object sources, arrays
/// included, are skipped.
///
/// A source can never alias `target` here: the exclusive borrow on `target`
/// rules out the circular reference case at compile time.
pub fn merge<'a>(target: &'a mut Value, sources: &[&Value]) -> Option<&'a mut Value> {
    let Value::Object(slots) = &mut *target else {
        return None;
    };

    for source in sources {
        let Value::Object(incoming) = source else {
            continue;
        };

        for (key, value) in incoming {
            match value {
                Value::Array(items) => {
                    slots.insert(key.clone(), Value::Array(deep_clone_array(items)));
                }
                specific if specific.is_specific() => {
                    slots.insert(key.clone(), clone_specific(specific));
                }
                Value::Object(_) => {
                    let in_place = slots.get(key).is_some_and(Value::is_object);
                    if in_place {
                        if let Some(existing) = slots.get_mut(key) {
                            merge(existing, &[value]);
                        }
                    } else {
                        let mut fresh = Value::object();
                        merge(&mut fresh, &[value]);
                        slots.insert(key.clone(), fresh);
                    }
                }
                primitive => {
                    slots.insert(key.clone(), primitive.clone());
                }
            }
        }
    }

    Some(target)
}

/// Merges `sources` into a fresh object, leaving every input untouched.
pub fn merged(sources: &[&Value]) -> Value {
    let mut target = Value::object();
    merge(&mut target, sources);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_non_object_target_is_not_merged() {
        let mut target = v(json!([1, 2]));
        assert!(merge(&mut target, &[&v(json!({"a": 1}))]).is_none());
        let mut target = Value::Null;
        assert!(merge(&mut target, &[]).is_none());
    }

    #[test]
    fn test_no_sources_returns_target_unchanged() {
        let mut target = v(json!({"a": 1}));
        let result = merge(&mut target, &[]).cloned();
        assert_eq!(result, Some(v(json!({"a": 1}))));
    }

    #[test]
    fn test_later_sources_win_key_by_key() {
        let a = v(json!({"headers": {"Accept": "a", "X-One": "1"}, "timeout": 10}));
        let b = v(json!({"headers": {"Accept": "b"}, "debug": true}));
        let result = merged(&[&a, &b]);
        assert_eq!(
            result,
            v(json!({
                "headers": {"Accept": "b", "X-One": "1"},
                "timeout": 10,
                "debug": true
            }))
        );
    }

    #[test]
    fn test_sources_are_not_mutated() {
        let a = v(json!({"nested": {"x": 1}, "list": [1, {"y": 2}]}));
        let b = v(json!({"nested": {"z": 3}}));
        let a_before = a.clone();
        let b_before = b.clone();

        let mut result = merged(&[&a, &b]);
        if let Value::Object(map) = &mut result {
            map.insert("nested".into(), Value::Null);
        }

        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn test_object_overwrites_non_object_slot() {
        let mut target = v(json!({"a": [1, 2], "b": null, "c": 5}));
        let source = v(json!({"a": {"x": 1}, "b": {"y": 2}, "c": {"z": 3}}));
        merge(&mut target, &[&source]);
        assert_eq!(target, v(json!({"a": {"x": 1}, "b": {"y": 2}, "c": {"z": 3}})));
    }

    #[test]
    fn test_array_replaces_rather_than_merges() {
        let mut target = v(json!({"list": [1, 2, 3]}));
        merge(&mut target, &[&v(json!({"list": [9]}))]);
        assert_eq!(target, v(json!({"list": [9]})));
    }

    #[test]
    fn test_array_sources_are_skipped() {
        let mut target = v(json!({"a": 1}));
        merge(&mut target, &[&v(json!([{"a": 2}])), &Value::from("str")]);
        assert_eq!(target, v(json!({"a": 1})));
    }

    #[test]
    fn test_specific_values_are_copied() {
        let when = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let pattern = Regex::new("^ab+c$").unwrap();

        let mut source_map = Map::new();
        source_map.insert("buf".into(), Value::Bytes(vec![1, 2, 3]));
        source_map.insert("when".into(), Value::Date(when));
        source_map.insert(
            "list".into(),
            Value::Array(vec![Value::Pattern(pattern.clone()), Value::Bytes(vec![7])]),
        );
        let source = Value::Object(source_map);

        let result = merged(&[&source]);
        assert_eq!(result.get("buf"), Some(&Value::Bytes(vec![1, 2, 3])));
        assert_eq!(result.get("when"), Some(&Value::Date(when)));
        match result.get("list") {
            Some(Value::Array(items)) => {
                assert!(matches!(&items[0], Value::Pattern(re) if re.is_match("abbc")));
                assert_eq!(items[1], Value::Bytes(vec![7]));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip_of_specific_values() {
        let json: serde_json::Value = Value::Bytes(vec![1, 2]).into();
        assert_eq!(json, json!([1, 2]));
        let json: serde_json::Value = Value::Pattern(Regex::new("a.c").unwrap()).into();
        assert_eq!(json, json!("a.c"));
    }
}
