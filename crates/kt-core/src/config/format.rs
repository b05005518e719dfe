//! Structured document formats for config files and edit sessions

use crate::engine::{EngineError, Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported config document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Toml,
    #[value(alias = "yml")]
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
        }
    }

    /// File extension used for edit sessions
    pub fn extension(&self) -> &'static str {
        self.name()
    }

    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    /// Serialize a document in key order. TOML cannot express null, so null
    /// entries are dropped.
    pub fn serialize(&self, value: &Value) -> Result<String, EngineError> {
        let text = match self {
            ConfigFormat::Toml => match value.without_nulls() {
                Value::Map(root) => {
                    let mut out = String::new();
                    self.write_toml_table(&mut out, &[], &root)?;
                    out
                }
                _ => return Err(self.error("the document root must be a table")),
            },
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| self.error(e))?,
            ConfigFormat::Json => {
                let mut text = serde_json::to_string_pretty(value).map_err(|e| self.error(e))?;
                text.push('\n');
                text
            }
        };
        Ok(text)
    }

    /// Parse a document
    pub fn parse(&self, text: &str) -> Result<Value, EngineError> {
        match self {
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| self.error(e)),
            ConfigFormat::Yaml => {
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_yaml::from_str(text).map_err(|e| self.error(e))
            }
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| self.error(e)),
        }
    }

    /// Prefix a document with `#` comment lines; JSON has no comments and is left as is
    pub fn with_header(&self, header: &[String], body: &str) -> String {
        if header.is_empty() || *self == ConfigFormat::Json {
            return body.to_string();
        }
        let mut out = String::new();
        for line in header {
            if line.is_empty() {
                out.push_str("#\n");
            } else {
                out.push_str("# ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        out.push_str(body);
        out
    }

    /// TOML writes every plain value of a table before its sub-tables. A
    /// sub-table followed by a plain value is written inline so the document
    /// keeps the key order; trailing sub-tables become `[sections]`.
    fn write_toml_table(&self, out: &mut String, path: &[&str], map: &Map) -> Result<(), EngineError> {
        let inline = map
            .values()
            .rposition(|value| !matches!(value, Value::Map(_)))
            .map_or(0, |last| last + 1);

        if !path.is_empty() && (inline > 0 || map.is_empty()) {
            if !out.is_empty() {
                out.push('\n');
            }
            let header: Vec<String> = path.iter().map(|key| toml_key(key)).collect();
            out.push_str(&format!("[{}]\n", header.join(".")));
        }

        for (key, value) in map.iter().take(inline) {
            let value = toml::Value::try_from(value).map_err(|e| self.error(e))?;
            out.push_str(&format!("{} = {}\n", toml_key(key), value));
        }

        for (key, value) in map.iter().skip(inline) {
            if let Value::Map(table) = value {
                let mut child = path.to_vec();
                child.push(key.as_str());
                self.write_toml_table(out, &child, table)?;
            }
        }
        Ok(())
    }

    fn error(&self, err: impl fmt::Display) -> EngineError {
        EngineError::Document {
            format: self.name(),
            message: err.to_string(),
        }
    }
}

fn toml_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        key.to_string()
    } else {
        toml::Value::String(key.to_string()).to_string()
    }
}

impl FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(format!("unknown config format '{}'", other)),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        let mut app = Map::new();
        app.insert("name".into(), "app".into());
        app.insert("port".into(), 8080.into());
        let mut root = Map::new();
        root.insert("zeta".into(), true.into());
        root.insert("app".into(), Value::Map(app));
        Value::Map(root)
    }

    fn sample_table_first() -> Value {
        let mut app = Map::new();
        app.insert("name".into(), "a".into());
        let mut root = Map::new();
        root.insert("app".into(), Value::Map(app));
        root.insert("zeta".into(), 1.into());
        Value::Map(root)
    }

    fn keys(value: &Value) -> Vec<String> {
        value.as_map().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("c.TOML")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("d.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("e")), None);
    }

    #[test]
    fn test_toml_document() {
        let text = ConfigFormat::Toml.serialize(&sample()).unwrap();
        assert!(text.contains("zeta = true"));
        assert!(text.contains("[app]"));
        assert!(text.contains("port = 8080"));

        let parsed = ConfigFormat::Toml.parse(&text).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_yaml_keeps_order() {
        let text = ConfigFormat::Yaml.serialize(&sample()).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("app").unwrap());
        assert!(text.find("name").unwrap() < text.find("port").unwrap());

        let parsed = ConfigFormat::Yaml.parse(&text).unwrap();
        assert_eq!(keys(&parsed), vec!["zeta", "app"]);
    }

    #[test]
    fn test_json_document() {
        let text = ConfigFormat::Json.serialize(&sample()).unwrap();
        let parsed = ConfigFormat::Json.parse(&text).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_toml_keeps_table_before_value() {
        let text = ConfigFormat::Toml.serialize(&sample_table_first()).unwrap();
        assert!(text.find("app").unwrap() < text.find("zeta").unwrap());
        assert!(text.starts_with("app = {"));

        let parsed = ConfigFormat::Toml.parse(&text).unwrap();
        assert_eq!(keys(&parsed), vec!["app", "zeta"]);
        assert_eq!(parsed, sample_table_first());
    }

    #[test]
    fn test_toml_trailing_tables_are_sections() {
        let mut db = Map::new();
        db.insert("host".into(), "localhost".into());
        let mut inner = Map::new();
        inner.insert("level".into(), 2.into());
        let mut nested = Map::new();
        nested.insert("inner".into(), Value::Map(inner));
        let mut root = Map::new();
        root.insert("name".into(), "demo".into());
        root.insert("db".into(), Value::Map(db));
        root.insert("nested".into(), Value::Map(nested));
        root.insert("my key".into(), Value::Map(Map::new()));

        let text = ConfigFormat::Toml.serialize(&Value::Map(root.clone())).unwrap();
        assert_eq!(
            text,
            "name = \"demo\"\n\n[db]\nhost = \"localhost\"\n\n[nested.inner]\nlevel = 2\n\n[\"my key\"]\n"
        );
        assert_eq!(ConfigFormat::Toml.parse(&text).unwrap(), Value::Map(root));
    }

    #[test]
    fn test_toml_drops_nulls() {
        let mut root = Map::new();
        root.insert("gone".into(), Value::Null);
        root.insert("kept".into(), 1.into());
        let text = ConfigFormat::Toml.serialize(&Value::Map(root)).unwrap();
        assert_eq!(text.trim(), "kept = 1");
    }

    #[test]
    fn test_parse_errors_are_document_errors() {
        let err = ConfigFormat::Toml.parse("this is = = not toml").unwrap_err();
        assert!(matches!(err, EngineError::Document { format: "toml", .. }));
    }

    #[test]
    fn test_header() {
        let header = vec!["Please fill in the values.".to_string(), String::new()];
        let doc = ConfigFormat::Toml.with_header(&header, "a = 1\n");
        assert_eq!(doc, "# Please fill in the values.\n#\n\na = 1\n");
        assert_eq!(ConfigFormat::Json.with_header(&header, "{}"), "{}");
    }
}
