//! Canonical value model shared by the context, prompt schema and config documents

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered string-keyed map used at every nesting level
pub type Map = IndexMap<String, Value>;

/// A context value
///
/// Maps keep insertion order, which is what lets generated config documents
/// follow the order fields were declared in the recipe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by guarded blocks: null, false, zero and empty values are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Deep-merge `other` into `self`.
    ///
    /// When both sides are maps the merge recurses key by key; otherwise the
    /// incoming value replaces the current one. Existing keys keep their position.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Map(target), Value::Map(source)) => merge_maps(target, source),
            (slot, other) => *slot = other,
        }
    }

    /// Copy of this value with every null removed from maps and lists
    pub fn without_nulls(&self) -> Value {
        match self {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(Value::without_nulls)
                    .collect(),
            ),
            Value::Map(map) => Value::Map(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.without_nulls()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Deep-merge `source` into `target`, recursing where both sides hold maps
pub fn merge_maps(target: &mut Map, source: Map) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing @ Value::Map(_)) if matches!(value, Value::Map(_)) => {
                existing.merge(value)
            }
            _ => {
                target.insert(key, value);
            }
        }
    }
}

/// Stringification used for `$(path)` interpolation
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
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

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_merge_recurses_into_maps() {
        let mut target = map(&[("app", map(&[("name", "a".into()), ("port", 1.into())]))]);
        target.merge(map(&[("app", map(&[("port", 2.into())]))]));

        assert_eq!(
            target,
            map(&[("app", map(&[("name", "a".into()), ("port", 2.into())]))])
        );
    }

    #[test]
    fn test_merge_replaces_scalar_with_map() {
        let mut target = map(&[("app", "flat".into())]);
        target.merge(map(&[("app", map(&[("name", "x".into())]))]));

        assert_eq!(target, map(&[("app", map(&[("name", "x".into())]))]));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let patch = map(&[
            ("a", map(&[("b", 1.into()), ("c", Value::List(vec!["x".into()]))])),
            ("d", true.into()),
        ]);
        let mut once = Value::Map(Map::new());
        once.merge(patch.clone());
        let mut twice = once.clone();
        twice.merge(patch);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_keeps_existing_key_position() {
        let mut target = map(&[("first", 1.into()), ("second", 2.into())]);
        target.merge(map(&[("third", 3.into()), ("first", 10.into())]));

        let keys: Vec<_> = target.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from("no").is_truthy());
        assert!(Value::Integer(2).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Integer(8080).to_string(), "8080");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(
            Value::List(vec!["a".into(), 1.into()]).to_string(),
            r#"["a",1]"#
        );
    }

    #[test]
    fn test_without_nulls() {
        let value = map(&[("a", Value::Null), ("b", map(&[("c", Value::Null), ("d", 1.into())]))]);
        assert_eq!(value.without_nulls(), map(&[("b", map(&[("d", 1.into())]))]));
    }
}
