//! Conversion between Lua values and the canonical [`Value`] model
//!
//! Lua has a single aggregate type. A table whose keys are exactly the
//! integers `1..=n` is read as a list; every other table (including the empty
//! one) is read as a map with stringified keys.

use super::error::{EngineError, Result};
use super::value::{Map, Value};
use mlua::{Lua, Table, Value as LuaValue};

/// Tables nested deeper than this are rejected (also catches self-referencing tables)
const MAX_DEPTH: usize = 64;

/// Convert a Lua value into a [`Value`]
pub fn from_lua(value: &LuaValue, action: &'static str) -> Result<Value> {
    convert(value, action, 0)
}

/// Convert a Lua table into an ordered map, refusing list-shaped tables
pub fn map_from_lua(table: &Table, action: &'static str) -> Result<Map> {
    match read_table(table, action, 0)? {
        Aggregate::Map(map) => Ok(map),
        Aggregate::List(_) => Err(EngineError::invalid(
            action,
            "expected a table with named fields, got a list",
        )),
    }
}

/// Convert an optional options table (`nil` means no options)
pub fn options_from_lua(table: Option<&Table>, action: &'static str) -> Result<Map> {
    match table {
        Some(table) => map_from_lua(table, action),
        None => Ok(Map::new()),
    }
}

fn convert(value: &LuaValue, action: &'static str, depth: usize) -> Result<Value> {
    match value {
        LuaValue::Nil => Ok(Value::Null),
        LuaValue::LightUserData(ud) if ud.0.is_null() => Ok(Value::Null),
        LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
        LuaValue::Integer(i) => Ok(Value::Integer(*i)),
        LuaValue::Number(n) => Ok(Value::Float(*n)),
        LuaValue::String(s) => Ok(Value::String(s.to_string_lossy().to_string())),
        LuaValue::Table(table) => Ok(match read_table(table, action, depth)? {
            Aggregate::List(items) => Value::List(items),
            Aggregate::Map(map) => Value::Map(map),
        }),
        other => Err(EngineError::invalid(
            action,
            format!("cannot use a {} as data", other.type_name()),
        )),
    }
}

/// What a Lua table reads as
enum Aggregate {
    List(Vec<Value>),
    Map(Map),
}

fn read_table(table: &Table, action: &'static str, depth: usize) -> Result<Aggregate> {
    if depth >= MAX_DEPTH {
        return Err(EngineError::invalid(
            action,
            format!("tables nested deeper than {} levels", MAX_DEPTH),
        ));
    }

    let mut entries = Vec::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair.map_err(EngineError::lua)?;
        entries.push((key, convert(&value, action, depth + 1)?));
    }

    if let Some(order) = sequence_order(&entries) {
        let mut slots: Vec<Option<Value>> = entries.into_iter().map(|(_, v)| Some(v)).collect();
        let items = order.into_iter().filter_map(|i| slots[i].take()).collect();
        return Ok(Aggregate::List(items));
    }

    let mut map = Map::with_capacity(entries.len());
    for (key, value) in entries {
        map.insert(key_to_string(&key, action)?, value);
    }
    Ok(Aggregate::Map(map))
}

/// When the keys are exactly the integers `1..=n`, the entry positions in index order
fn sequence_order(entries: &[(LuaValue, Value)]) -> Option<Vec<usize>> {
    if entries.is_empty() {
        return None;
    }

    let len = entries.len();
    let mut order: Vec<Option<usize>> = vec![None; len];
    for (position, (key, _)) in entries.iter().enumerate() {
        let index = match key {
            LuaValue::Integer(i) if *i >= 1 && (*i as usize) <= len => *i as usize - 1,
            _ => return None,
        };
        if order[index].replace(position).is_some() {
            return None;
        }
    }
    order.into_iter().collect()
}

fn key_to_string(key: &LuaValue, action: &'static str) -> Result<String> {
    match key {
        LuaValue::String(s) => Ok(s.to_string_lossy().to_string()),
        LuaValue::Integer(i) => Ok(i.to_string()),
        LuaValue::Number(n) => Ok(n.to_string()),
        LuaValue::Boolean(b) => Ok(b.to_string()),
        other => Err(EngineError::invalid(
            action,
            format!("cannot use a {} as a table key", other.type_name()),
        )),
    }
}

/// Convert a [`Value`] into a Lua value
pub fn to_lua(lua: &Lua, value: &Value) -> mlua::Result<LuaValue> {
    Ok(match value {
        Value::Null => LuaValue::Nil,
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::Integer(i) => LuaValue::Integer(*i),
        Value::Float(f) => LuaValue::Number(*f),
        Value::String(s) => LuaValue::String(lua.create_string(s)?),
        Value::List(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Map(map) => {
            let table = lua.create_table_with_capacity(0, map.len())?;
            for (key, item) in map {
                table.raw_set(key.as_str(), to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
    })
}

/// Flatten a value into a list: lists as-is, map values in order,
/// null into an empty list and any scalar into a one-element list
pub fn to_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::List(items)) => items.clone(),
        Some(Value::Map(map)) => map.values().cloned().collect(),
        Some(scalar) => vec![scalar.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(lua: &Lua, expr: &str) -> Value {
        let value: LuaValue = lua.load(expr).eval().unwrap();
        from_lua(&value, "test").unwrap()
    }

    #[test]
    fn test_dense_integer_keys_become_list() {
        let lua = Lua::new();
        assert_eq!(
            eval(&lua, r#"{"a", "b", "c"}"#),
            Value::List(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(
            eval(&lua, r#"{[2] = "b", [1] = "a"}"#),
            Value::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_sparse_integer_keys_become_map() {
        let lua = Lua::new();
        let value = eval(&lua, r#"{[1] = "a", [3] = "c"}"#);
        let map = value.as_map().unwrap();
        assert_eq!(map.get("1"), Some(&Value::from("a")));
        assert_eq!(map.get("3"), Some(&Value::from("c")));
    }

    #[test]
    fn test_list_prefix_before_a_gap_keeps_values() {
        let lua = Lua::new();
        let value = eval(&lua, r#"{"a", "b", [4] = "d"}"#);
        let map = value.as_map().unwrap();
        assert_eq!(map.get("1"), Some(&Value::from("a")));
        assert_eq!(map.get("2"), Some(&Value::from("b")));
        assert_eq!(map.get("4"), Some(&Value::from("d")));
    }

    #[test]
    fn test_keys_not_starting_at_one_become_map() {
        let lua = Lua::new();
        let value = eval(&lua, r#"{[0] = "z", [1] = "a"}"#);
        assert!(value.as_map().is_some());
    }

    #[test]
    fn test_mixed_keys_become_map() {
        let lua = Lua::new();
        let value = eval(&lua, r#"{"a", name = "x"}"#);
        let map = value.as_map().unwrap();
        assert_eq!(map.get("1"), Some(&Value::from("a")));
        assert_eq!(map.get("name"), Some(&Value::from("x")));
    }

    #[test]
    fn test_empty_table_is_map() {
        let lua = Lua::new();
        assert_eq!(eval(&lua, "{}"), Value::Map(Map::new()));
    }

    #[test]
    fn test_scalars() {
        let lua = Lua::new();
        assert_eq!(eval(&lua, "8080"), Value::Integer(8080));
        assert_eq!(eval(&lua, "1.5"), Value::Float(1.5));
        assert_eq!(eval(&lua, "true"), Value::Bool(true));
        assert_eq!(eval(&lua, "nil"), Value::Null);
        assert_eq!(eval(&lua, "'hi'"), Value::from("hi"));
    }

    #[test]
    fn test_functions_are_rejected() {
        let lua = Lua::new();
        let value: LuaValue = lua.load("{ f = function() end }").eval().unwrap();
        let err = from_lua(&value, "declare").unwrap_err();
        assert!(err.to_string().contains("function"));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let lua = Lua::new();
        let value: LuaValue = lua.load("local t = {} t.me = t return t").eval().unwrap();
        assert!(from_lua(&value, "declare").is_err());
    }

    #[test]
    fn test_round_trip_through_lua() {
        let lua = Lua::new();
        let mut inner = Map::new();
        inner.insert("deps".into(), Value::List(vec!["serde".into(), "clap".into()]));
        inner.insert("port".into(), Value::Integer(80));
        let value = Value::Map(inner);

        let back = from_lua(&to_lua(&lua, &value).unwrap(), "test").unwrap();
        let map = back.as_map().unwrap();
        assert_eq!(map.get("deps"), value.as_map().unwrap().get("deps"));
        assert_eq!(map.get("port"), Some(&Value::Integer(80)));
    }

    #[test]
    fn test_to_list() {
        assert!(to_list(None).is_empty());
        assert!(to_list(Some(&Value::Null)).is_empty());
        assert_eq!(to_list(Some(&Value::from("x"))), vec![Value::from("x")]);
        assert_eq!(
            to_list(Some(&Value::List(vec![1.into(), 2.into()]))),
            vec![Value::Integer(1), Value::Integer(2)]
        );
    }
}
