//! Prompt schema trees and the run-wide `CollectedPrompts` accumulator

use super::context::Context;
use super::error::{EngineError, Result};
use super::order::SourceSpan;
use super::value::{Map, Value};
use indexmap::IndexMap;

/// A single prompted value
#[derive(Debug, Clone, PartialEq)]
pub struct PromptField {
    pub default: Value,
    pub comment: Option<String>,
}

/// A node of a prompt schema
#[derive(Debug, Clone, PartialEq)]
pub enum PromptNode {
    Field(PromptField),
    Section(PromptSection),
}

impl PromptNode {
    fn kind(&self) -> &'static str {
        match self {
            PromptNode::Field(_) => "field",
            PromptNode::Section(_) => "section",
        }
    }
}

/// An ordered group of prompt nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptSection {
    pub comment: Option<String>,
    pub fields: IndexMap<String, PromptNode>,
}

impl PromptSection {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge another schema into this one.
    ///
    /// Keys already present keep their position, new keys are appended and a
    /// re-declared field takes the newer default. Changing a key between a field
    /// and a section is a [`EngineError::SchemaConflict`].
    pub fn merge(&mut self, other: PromptSection) -> Result<()> {
        self.merge_at("", other)
    }

    fn merge_at(&mut self, prefix: &str, other: PromptSection) -> Result<()> {
        if other.comment.is_some() {
            self.comment = other.comment;
        }
        for (key, node) in other.fields {
            let path = join(prefix, &key);
            match self.fields.get_mut(&key) {
                None => {
                    self.fields.insert(key, node);
                }
                Some(existing) => match (existing, node) {
                    (PromptNode::Field(current), PromptNode::Field(incoming)) => *current = incoming,
                    (PromptNode::Section(current), PromptNode::Section(incoming)) => {
                        current.merge_at(&path, incoming)?
                    }
                    (current, incoming) => {
                        return Err(EngineError::SchemaConflict {
                            path,
                            existing: current.kind(),
                            incoming: incoming.kind(),
                        })
                    }
                },
            }
        }
        Ok(())
    }

    /// Add a single field at a dotted path
    pub fn insert_field(&mut self, path: &str, field: PromptField) -> Result<()> {
        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };
        let mut section = PromptSection::default();
        section
            .fields
            .insert(leaf.to_string(), PromptNode::Field(field));
        for segment in parents.into_iter().flat_map(|p| p.rsplit('.')) {
            let mut fields = IndexMap::new();
            fields.insert(segment.to_string(), PromptNode::Section(section));
            section = PromptSection {
                comment: None,
                fields,
            };
        }
        self.merge(section)
    }

    /// Values tree: each field takes the context value at its path when
    /// present and its default otherwise
    pub fn resolve(&self, context: &Context) -> Map {
        self.resolve_at("", context)
    }

    fn resolve_at(&self, prefix: &str, context: &Context) -> Map {
        self.fields
            .iter()
            .map(|(key, node)| {
                let path = join(prefix, key);
                let value = match node {
                    PromptNode::Field(field) => context
                        .get(&path)
                        .cloned()
                        .unwrap_or_else(|| field.default.clone()),
                    PromptNode::Section(section) => Value::Map(section.resolve_at(&path, context)),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// `(path, text)` for every annotated section and field, in tree order
    pub fn annotations(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_annotations("", &mut out);
        out
    }

    fn collect_annotations(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        for (key, node) in &self.fields {
            let path = join(prefix, key);
            match node {
                PromptNode::Field(field) => {
                    if let Some(comment) = &field.comment {
                        out.push((path, comment.clone()));
                    }
                }
                PromptNode::Section(section) => {
                    if let Some(comment) = &section.comment {
                        out.push((path.clone(), comment.clone()));
                    }
                    section.collect_annotations(&path, out);
                }
            }
        }
    }
}

/// One `r.prompt` call resolved against the context
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    /// The call's schema in declaration order
    pub schema: PromptSection,
    /// Defaults overlaid with values already known to the context
    pub values: Map,
    /// Dotted paths with no value in the context
    pub missing: Vec<String>,
}

impl ResolvedPrompt {
    pub fn needs_input(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Walk a prompt argument, resolving each field against the context and
/// ordering each level by the recipe source when a span is available
pub fn resolve_prompt(
    schema: Map,
    context: &Context,
    span: Option<&SourceSpan<'_>>,
) -> Result<ResolvedPrompt> {
    let mut missing = Vec::new();
    let (schema, values) = resolve_section("", schema, context, span, &mut missing)?;
    Ok(ResolvedPrompt {
        schema,
        values,
        missing,
    })
}

fn resolve_section(
    prefix: &str,
    node: Map,
    context: &Context,
    span: Option<&SourceSpan<'_>>,
    missing: &mut Vec<String>,
) -> Result<(PromptSection, Map)> {
    let comment = node
        .get("_comment")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut entries: Vec<(String, Value)> = node
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .collect();
    if let Some(span) = span {
        span.rank_by(&mut entries, |(key, _)| key.as_str());
    }

    let mut section = PromptSection {
        comment,
        fields: IndexMap::with_capacity(entries.len()),
    };
    let mut values = Map::with_capacity(entries.len());

    for (key, node) in entries {
        let path = join(prefix, &key);
        match node {
            Value::Map(mut def) if def.contains_key("default") => {
                let default = def.shift_remove("default").unwrap_or_default();
                let comment = def
                    .get("comment")
                    .or_else(|| def.get("description"))
                    .and_then(Value::as_str)
                    .map(str::to_string);

                let value = match context.get(&path) {
                    Some(known) => known.clone(),
                    None => {
                        missing.push(path);
                        default.clone()
                    }
                };
                section
                    .fields
                    .insert(key.clone(), PromptNode::Field(PromptField { default, comment }));
                values.insert(key, value);
            }
            Value::Map(children) => {
                let child_span = span.map(|s| s.child(&key));
                let (child, child_values) =
                    resolve_section(&path, children, context, child_span.as_ref(), missing)?;
                section.fields.insert(key.clone(), PromptNode::Section(child));
                values.insert(key, Value::Map(child_values));
            }
            _ => {
                return Err(EngineError::invalid(
                    "prompt",
                    format!(
                        "'{}' must be a table with a `default` or a table of fields",
                        path
                    ),
                ))
            }
        }
    }

    Ok((section, values))
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::order::RecipeSource;

    fn field(default: Value) -> PromptNode {
        PromptNode::Field(PromptField {
            default,
            comment: None,
        })
    }

    fn leaf(default: Value) -> Value {
        Value::Map(Map::from_iter([("default".to_string(), default)]))
    }

    fn section(entries: Vec<(&str, PromptNode)>) -> PromptSection {
        PromptSection {
            comment: None,
            fields: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    fn keys(map: &Map) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_resolve_uses_context_then_default() {
        let schema = Map::from_iter([(
            "app".to_string(),
            Value::Map(Map::from_iter([
                ("name".to_string(), leaf("app".into())),
                ("port".to_string(), leaf(8080.into())),
            ])),
        )]);
        let mut ctx = Context::new();
        ctx.set("app.name", "demo".into());

        let resolved = resolve_prompt(schema, &ctx, None).unwrap();
        let app = resolved.values["app"].as_map().unwrap();
        assert_eq!(app["name"], Value::from("demo"));
        assert_eq!(app["port"], Value::Integer(8080));
        assert_eq!(resolved.missing, vec!["app.port".to_string()]);
        assert!(resolved.needs_input());
    }

    #[test]
    fn test_resolve_orders_by_source() {
        let source = RecipeSource::new(
            "r.prompt({ app = { port = { default = 1 }, name = { default = 'x' } }, _comment = 'c' })",
        );
        let span = source.prompt_span(1).unwrap();
        // bridged order deliberately differs from the source
        let schema = Map::from_iter([(
            "app".to_string(),
            Value::Map(Map::from_iter([
                ("name".to_string(), leaf("x".into())),
                ("port".to_string(), leaf(1.into())),
            ])),
        )]);

        let resolved = resolve_prompt(schema, &Context::new(), Some(&span)).unwrap();
        assert_eq!(keys(resolved.values["app"].as_map().unwrap()), vec!["port", "name"]);
    }

    #[test]
    fn test_resolve_rejects_bare_scalars() {
        let schema = Map::from_iter([("name".to_string(), Value::from("x"))]);
        let err = resolve_prompt(schema, &Context::new(), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { action: "prompt", .. }));
    }

    #[test]
    fn test_comments_are_collected() {
        let schema = Map::from_iter([(
            "app".to_string(),
            Value::Map(Map::from_iter([
                ("_comment".to_string(), Value::from("Application")),
                (
                    "name".to_string(),
                    Value::Map(Map::from_iter([
                        ("default".to_string(), Value::from("x")),
                        ("comment".to_string(), Value::from("Display name")),
                    ])),
                ),
            ])),
        )]);
        let resolved = resolve_prompt(schema, &Context::new(), None).unwrap();
        assert_eq!(
            resolved.schema.annotations(),
            vec![
                ("app".to_string(), "Application".to_string()),
                ("app.name".to_string(), "Display name".to_string())
            ]
        );
    }

    #[test]
    fn test_merge_keeps_positions_and_appends() {
        let mut collected = section(vec![("b", field(1.into())), ("a", field(2.into()))]);
        collected
            .merge(section(vec![("c", field(3.into())), ("b", field(10.into()))]))
            .unwrap();

        let order: Vec<_> = collected.fields.keys().cloned().collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(collected.fields["b"], field(10.into()));
    }

    #[test]
    fn test_merge_flags_shape_conflict() {
        let mut collected = section(vec![("app", field(1.into()))]);
        let err = collected
            .merge(section(vec![(
                "app",
                PromptNode::Section(section(vec![("name", field("x".into()))])),
            )]))
            .unwrap_err();

        match err {
            EngineError::SchemaConflict {
                path,
                existing,
                incoming,
            } => {
                assert_eq!(path, "app");
                assert_eq!(existing, "field");
                assert_eq!(incoming, "section");
            }
            other => panic!("unexpected error: {other}"),
        }
        // the failed merge leaves the existing key in place
        assert!(collected.fields.contains_key("app"));
    }

    #[test]
    fn test_insert_field_builds_sections() {
        let mut collected = PromptSection::default();
        collected
            .insert_field(
                "setup.git",
                PromptField {
                    default: true.into(),
                    comment: Some("Init git?".into()),
                },
            )
            .unwrap();

        collected
            .insert_field(
                "a.b.c",
                PromptField {
                    default: 1.into(),
                    comment: None,
                },
            )
            .unwrap();
        collected
            .insert_field(
                "proceed",
                PromptField {
                    default: false.into(),
                    comment: None,
                },
            )
            .unwrap();

        let values = collected.resolve(&Context::new());
        assert_eq!(values["setup"].as_map().unwrap()["git"], Value::Bool(true));
        let b = values["a"].as_map().unwrap()["b"].as_map().unwrap();
        assert_eq!(b["c"], Value::Integer(1));
        assert_eq!(values["proceed"], Value::Bool(false));
        assert_eq!(
            values.keys().collect::<Vec<_>>(),
            vec!["setup", "a", "proceed"]
        );
    }

    #[test]
    fn test_resolve_prefers_context() {
        let collected = section(vec![(
            "app",
            PromptNode::Section(section(vec![
                ("name", field("app".into())),
                ("port", field(8080.into())),
            ])),
        )]);
        let mut ctx = Context::new();
        ctx.set("app.port", 9000.into());

        let values = collected.resolve(&ctx);
        let app = values["app"].as_map().unwrap();
        assert_eq!(app["name"], Value::from("app"));
        assert_eq!(app["port"], Value::Integer(9000));
    }
}
