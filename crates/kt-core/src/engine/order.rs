//! Declaration-order recovery for `r.prompt` arguments
//!
//! Lua tables do not remember the order their fields were written in, so the
//! engine goes back to the recipe text: it finds the source span of the Nth
//! `r.prompt` call and ranks each key by where it is first assigned inside
//! that span, counting only assignments made directly in the table
//! constructor that owns the key. Nested levels are ranked inside the
//! constructor that follows their parent key.

use regex::Regex;
use std::ops::Range;

/// What a byte of recipe source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    Str,
    Comment,
}

/// Recipe text together with the spans of its `r.prompt` calls
#[derive(Debug, Clone)]
pub struct RecipeSource {
    text: String,
    regions: Vec<Region>,
    depths: Vec<usize>,
    prompt_calls: Vec<Range<usize>>,
}

impl RecipeSource {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let regions = classify(text.as_bytes());
        let depths = nesting(text.as_bytes(), &regions);
        let prompt_calls = find_calls(&text, &regions, "r", "prompt");
        Self {
            text,
            regions,
            depths,
            prompt_calls,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of textual `r.prompt` call sites
    pub fn prompt_call_count(&self) -> usize {
        self.prompt_calls.len()
    }

    /// Span of the table passed to the `ordinal`-th (1-based) prompt call, or
    /// of its whole argument list when the argument is not a table literal
    pub fn prompt_span(&self, ordinal: usize) -> Option<SourceSpan<'_>> {
        let call = self.prompt_calls.get(ordinal.checked_sub(1)?)?.clone();
        let range = self.table_at(call.start + 1, call.end).unwrap_or(call);
        Some(SourceSpan {
            source: self,
            range,
        })
    }

    fn is_code(&self, offset: usize) -> bool {
        self.regions.get(offset) == Some(&Region::Code)
    }

    /// The table constructor starting at the first code token in `from..end`
    fn table_at(&self, from: usize, end: usize) -> Option<Range<usize>> {
        let bytes = self.text.as_bytes();
        let open = (from..end).find(|&i| self.is_code(i) && !bytes[i].is_ascii_whitespace())?;
        if bytes[open] != b'{' {
            return None;
        }
        let close = matching_close(bytes, &self.regions, open)?;
        (close < end).then(|| open..close + 1)
    }
}

/// A region of the recipe in which keys are ranked
#[derive(Debug, Clone)]
pub struct SourceSpan<'a> {
    source: &'a RecipeSource,
    range: Range<usize>,
}

impl<'a> SourceSpan<'a> {
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn as_str(&self) -> &'a str {
        &self.source.text[self.range.clone()]
    }

    /// Absolute offset of the first assignment to `key` inside this span
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.assignment(key).map(|(start, _)| start)
    }

    /// Narrow to the table constructor assigned to `key`, or stay on this span
    /// when `key` is not assigned a literal table here
    pub fn child(&self, key: &str) -> SourceSpan<'a> {
        let narrowed = self
            .assignment(key)
            .and_then(|(_, value_start)| self.source.table_at(value_start, self.range.end));

        SourceSpan {
            source: self.source,
            range: narrowed.unwrap_or_else(|| self.range.clone()),
        }
    }

    /// Order items by the first assignment of their key in this span. Items
    /// whose key cannot be located keep their relative order and go last.
    pub fn rank_by<T>(&self, items: &mut [T], key: impl Fn(&T) -> &str) {
        items.sort_by_cached_key(|item| self.position_of(key(item)).unwrap_or(usize::MAX));
    }

    /// Returns (key token start, offset just after `=`) of the first assignment
    /// made directly inside the span's outermost delimiters
    fn assignment(&self, key: &str) -> Option<(usize, usize)> {
        let pattern = assignment_pattern(key)?;
        let haystack = &self.source.text[..self.range.end];
        let field_depth = self.source.depths.get(self.range.start)? + 1;
        let mut from = self.range.start;
        while from < self.range.end {
            let caps = pattern.captures_at(haystack, from)?;
            let token = caps.get(1)?;
            let eq = caps.get(2)?;
            if self.source.is_code(token.start())
                && self.source.is_code(eq.start())
                && self.source.depths[token.start()] == field_depth
            {
                return Some((token.start(), eq.end()));
            }
            from = token.end();
        }
        None
    }
}

/// Matches `key =`, `["key"] =` and `['key'] =` but not `key ==`
fn assignment_pattern(key: &str) -> Option<Regex> {
    let escaped = regex::escape(key);
    let bare = if key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!(r"\b{}|", escaped)
    } else {
        String::new()
    };
    Regex::new(&format!(
        r#"({bare}\[\s*"{escaped}"\s*\]|\[\s*'{escaped}'\s*\])\s*(=)(?:[^=]|$)"#
    ))
    .ok()
}

/// Classify every byte of Lua source as code, string literal or comment
fn classify(bytes: &[u8]) -> Vec<Region> {
    let mut regions = vec![Region::Code; bytes.len()];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = match long_bracket_level(bytes, i + 2) {
                    Some(level) => long_bracket_end(bytes, i + 2, level),
                    None => bytes[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |p| i + p),
                };
                regions[i..end].fill(Region::Comment);
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != quote && bytes[j] != b'\n' {
                    if bytes[j] == b'\\' {
                        j += 1;
                    }
                    j += 1;
                }
                let end = (j + 1).min(bytes.len());
                regions[i..end].fill(Region::Str);
                i = end;
            }
            b'[' => match long_bracket_level(bytes, i) {
                Some(level) => {
                    let end = long_bracket_end(bytes, i, level);
                    regions[i..end].fill(Region::Str);
                    i = end;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    regions
}

/// Number of open delimiters in code before each byte
fn nesting(bytes: &[u8], regions: &[Region]) -> Vec<usize> {
    let mut depths = Vec::with_capacity(bytes.len() + 1);
    let mut depth = 0usize;
    for (&b, &region) in bytes.iter().zip(regions) {
        depths.push(depth);
        if region != Region::Code {
            continue;
        }
        match b {
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depths.push(depth);
    depths
}

/// `[[`, `[=[`, `[==[` ... at `at`: returns the number of `=` signs
fn long_bracket_level(bytes: &[u8], at: usize) -> Option<usize> {
    if bytes.get(at) != Some(&b'[') {
        return None;
    }
    let level = bytes[at + 1..].iter().take_while(|&&b| b == b'=').count();
    (bytes.get(at + 1 + level) == Some(&b'[')).then_some(level)
}

/// Offset just past the `]=*]` closing a long bracket opened at `at`
fn long_bracket_end(bytes: &[u8], at: usize, level: usize) -> usize {
    let mut close = Vec::with_capacity(level + 2);
    close.push(b']');
    close.extend(std::iter::repeat(b'=').take(level));
    close.push(b']');

    let body = at + level + 2;
    bytes
        .get(body..)
        .and_then(|rest| rest.windows(close.len()).position(|w| w == close.as_slice()))
        .map_or(bytes.len(), |p| body + p + close.len())
}

/// Offset of the delimiter closing the one at `open`, skipping strings and comments
fn matching_close(bytes: &[u8], regions: &[Region], open: usize) -> Option<usize> {
    let mut stack = Vec::new();
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if regions[i] != Region::Code {
            continue;
        }
        match b {
            b'(' | b'{' | b'[' => stack.push(b),
            b')' | b'}' | b']' => {
                let expected = match b {
                    b')' => b'(',
                    b'}' => b'{',
                    _ => b'[',
                };
                if stack.pop() != Some(expected) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Argument spans of every `<object>.<method>(...)` / `<object>.<method>{...}` call in code
fn find_calls(text: &str, regions: &[Region], object: &str, method: &str) -> Vec<Range<usize>> {
    let pattern = Regex::new(&format!(
        r"\b{}\s*\.\s*{}\s*([({{])",
        regex::escape(object),
        regex::escape(method)
    ))
    .expect("valid call-site pattern");
    let bytes = text.as_bytes();

    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let open = caps.get(1)?.start();
            if regions[whole.start()] != Region::Code || regions[open] != Region::Code {
                return None;
            }
            // `xr.prompt` or `t.r.prompt` are other objects
            if whole.start() > 0 && bytes[whole.start() - 1] == b'.' {
                return None;
            }
            let close = matching_close(bytes, regions, open)?;
            Some(open..close + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(span: &SourceSpan<'_>, keys: &[&str]) -> Vec<String> {
        let mut keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        span.rank_by(&mut keys, |k| k.as_str());
        keys
    }

    #[test]
    fn test_finds_prompt_calls_in_order() {
        let source = RecipeSource::new(
            r#"
r.declare({ x = 1 })
r.prompt({ a = { default = 1 } })
r.prompt{ b = { default = 2 } }
"#,
        );
        assert_eq!(source.prompt_call_count(), 2);
        assert!(source.prompt_span(1).unwrap().as_str().contains("a ="));
        assert!(source.prompt_span(2).unwrap().as_str().starts_with("{ b"));
        assert!(source.prompt_span(3).is_none());
        assert!(source.prompt_span(0).is_none());
    }

    #[test]
    fn test_ignores_calls_in_comments_and_strings() {
        let source = RecipeSource::new(
            r#"
-- r.prompt({ old = { default = 0 } })
--[[ r.prompt({ older = {} }) ]]
local s = "r.prompt({ nope = 1 })"
r.prompt({ real = { default = 1 } })
"#,
        );
        assert_eq!(source.prompt_call_count(), 1);
        assert!(source.prompt_span(1).unwrap().as_str().contains("real"));
    }

    #[test]
    fn test_balances_nested_delimiters_and_strings() {
        let source = RecipeSource::new(
            r#"r.prompt({ a = { default = "})" }, b = { default = { 1, 2 } } }) r.run({"x"})"#,
        );
        let span = source.prompt_span(1).unwrap();
        assert!(span.as_str().ends_with("} }"));
        assert!(!span.as_str().contains("r.run"));
    }

    #[test]
    fn test_ranks_keys_by_first_assignment() {
        let source = RecipeSource::new(
            r#"
r.prompt({
    zeta = { default = 1 },
    alpha = { default = 2 },
    mid = { default = 3 },
})
"#,
        );
        let span = source.prompt_span(1).unwrap();
        assert_eq!(
            ranked(&span, &["alpha", "mid", "zeta"]),
            vec!["zeta", "alpha", "mid"]
        );
    }

    #[test]
    fn test_unlocated_keys_go_last_in_original_order() {
        let source = RecipeSource::new(r#"r.prompt({ b = { default = 1 }, a = { default = 2 } })"#);
        let span = source.prompt_span(1).unwrap();
        assert_eq!(
            ranked(&span, &["x", "a", "y", "b"]),
            vec!["b", "a", "x", "y"]
        );
    }

    #[test]
    fn test_bracketed_and_quoted_keys() {
        let source = RecipeSource::new(
            r#"r.prompt({ ["my-key"] = { default = 1 }, ['other key'] = { default = 2 }, plain = { default = 3 } })"#,
        );
        let span = source.prompt_span(1).unwrap();
        assert_eq!(
            ranked(&span, &["plain", "other key", "my-key"]),
            vec!["my-key", "other key", "plain"]
        );
    }

    #[test]
    fn test_equality_is_not_assignment() {
        let source = RecipeSource::new(
            r#"r.prompt({ a = { default = (b == 1) }, b = { default = 2 } })"#,
        );
        let span = source.prompt_span(1).unwrap();
        assert!(span.position_of("b").unwrap() > span.position_of("a").unwrap());
        assert_eq!(ranked(&span, &["b", "a"]), vec!["a", "b"]);
    }

    #[test]
    fn test_child_span_ranks_within_parent() {
        let source = RecipeSource::new(
            r#"
r.prompt({
    db = { port = { default = 5432 }, name = { default = "db" } },
    app = { name = { default = "app" }, port = { default = 8080 } },
})
"#,
        );
        let span = source.prompt_span(1).unwrap();
        assert_eq!(ranked(&span, &["app", "db"]), vec!["db", "app"]);
        assert_eq!(
            ranked(&span.child("app"), &["port", "name"]),
            vec!["name", "port"]
        );
        assert_eq!(
            ranked(&span.child("db"), &["name", "port"]),
            vec!["port", "name"]
        );
    }

    #[test]
    fn test_nested_key_does_not_rank_outer_key() {
        let source = RecipeSource::new(
            r#"
r.prompt({
    project = { name = { default = "demo" } },
    db = { host = { default = "localhost" }, name = { default = "db" } },
    name = { default = "top" },
})
"#,
        );
        let span = source.prompt_span(1).unwrap();
        assert_eq!(
            ranked(&span, &["name", "db", "project"]),
            vec!["project", "db", "name"]
        );
        let top = span.position_of("name").unwrap();
        assert!(source.text()[top..].starts_with("name = { default = \"top\""));

        let db = span.child("db");
        assert_eq!(ranked(&db, &["name", "host"]), vec!["host", "name"]);
    }

    #[test]
    fn test_child_narrows_into_own_constructor() {
        let source = RecipeSource::new(
            r#"r.prompt({ outer = { app = { port = { default = 1 } } }, app = { name = { default = "x" }, port = { default = 2 } } })"#,
        );
        let span = source.prompt_span(1).unwrap();
        let app = span.child("app");
        assert!(app.as_str().starts_with("{ name"));
        assert_eq!(ranked(&app, &["port", "name"]), vec!["name", "port"]);
    }

    #[test]
    fn test_prompt_with_variable_argument_has_no_ranks() {
        let source = RecipeSource::new(r#"local fields = { b = {}, a = {} } r.prompt(fields)"#);
        let span = source.prompt_span(1).unwrap();
        assert_eq!(span.as_str(), "(fields)");
        assert_eq!(ranked(&span, &["a", "b"]), vec!["a", "b"]);
    }

    #[test]
    fn test_child_of_non_table_value_keeps_span() {
        let source = RecipeSource::new(r#"r.prompt({ a = make(), b = { default = 1 } })"#);
        let span = source.prompt_span(1).unwrap();
        assert_eq!(span.child("a").range(), span.range());
        assert_eq!(span.child("missing").range(), span.range());
    }

    #[test]
    fn test_keys_inside_strings_are_ignored() {
        let source = RecipeSource::new(
            r#"r.prompt({ a = { default = "b = 1" }, b = { default = 2 } })"#,
        );
        let span = source.prompt_span(1).unwrap();
        let a = span.position_of("a").unwrap();
        let b = span.position_of("b").unwrap();
        assert!(source.text()[b..].starts_with("b = { default = 2"));
        assert!(a < b);
    }

    #[test]
    fn test_long_string_levels() {
        let source = RecipeSource::new("local s = [==[ r.prompt({}) ]] ]==] r.prompt({ k = {} })");
        assert_eq!(source.prompt_call_count(), 1);
        assert!(source.prompt_span(1).unwrap().as_str().contains('k'));
    }
}
