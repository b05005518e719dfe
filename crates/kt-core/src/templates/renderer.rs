//! Template rendering: Handlebars variables, then `{>command<}` shell substitutions

use crate::engine::Value;
use crate::runtime::{capture_shell, ProcessError};
use anyhow::Result;
use handlebars::Handlebars;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static SHELL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{>(.*?)<\}").expect("valid shell tag pattern"));

/// Renders template text against a context value
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing variables render as empty, output is not HTML
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render variables, then run every `{>command<}` and splice in its output.
    /// Variables are expanded first so commands may use them.
    pub fn render(&self, content: &str, data: &Value) -> Result<String> {
        let intermediate = self.render_variables(content, data)?;
        Ok(substitute_shell(&intermediate))
    }

    /// Render variables only; no subprocesses are started
    pub fn render_variables(&self, content: &str, data: &Value) -> Result<String> {
        Ok(self.handlebars.render_template(content, data)?)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace each `{>command<}` with the command's trimmed stdout, or an inline error marker
pub fn substitute_shell(text: &str) -> String {
    SHELL_TAG
        .replace_all(text, |caps: &Captures| {
            let command = caps[1].trim();
            match capture_shell(command) {
                Ok(stdout) => stdout,
                Err(ProcessError::Exit { code, stderr }) => format!(
                    "ERROR: Command '{}' failed with exit code {}: {}",
                    command,
                    code.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
                    stderr
                ),
                Err(err) => format!("ERROR: Failed to execute command '{}': {}", command, err),
            }
        })
        .into_owned()
}
