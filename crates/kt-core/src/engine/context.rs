//! Context store: the nested variable environment a recipe reads and writes

use super::value::{merge_maps, Map, Value};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static INTERPOLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([\w.]+)\)").expect("valid interpolation pattern"));

/// Ordered mapping from dotted paths to values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    root: Map,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a map value; anything else is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(root) => Some(Self { root }),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map {
        &self.root
    }

    pub fn to_value(&self) -> Value {
        Value::Map(self.root.clone())
    }

    /// Look up a dotted path. A missing segment anywhere yields `None`,
    /// which is distinct from an explicit `Value::Null`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Store a value at a dotted path, creating (or replacing with) maps along the way
    pub fn set(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        set_in(&mut self.root, &segments, value);
    }

    /// Deep-merge a map into the context
    pub fn merge(&mut self, fields: Map) {
        merge_maps(&mut self.root, fields);
    }

    /// Replace every `$(path)` with the stringified value at `path` (empty if absent)
    pub fn interpolate(&self, template: &str) -> String {
        INTERPOLATION
            .replace_all(template, |caps: &Captures| {
                self.get(&caps[1]).map(Value::to_string).unwrap_or_default()
            })
            .into_owned()
    }
}

fn set_in(map: &mut Map, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let slot = map
                .entry(first.to_string())
                .or_insert_with(|| Value::Map(Map::new()));
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::Map(Map::new());
            }
            if let Value::Map(child) = slot {
                set_in(child, rest, value);
            }
        }
    }
}
