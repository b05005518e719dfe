//! Human-in-the-loop steps used by `r.gate` and `r.prompt`

use anyhow::Result;

/// Result of a scoped edit session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The user saved; holds the full document text
    Saved(String),
    /// The session was closed without saving
    Abandoned,
}

/// Blocking interaction with whoever runs the recipe
pub trait Interaction {
    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Open `document` for editing; `extension` hints the file type (e.g. `toml`)
    fn edit(&mut self, document: &str, extension: &str) -> Result<EditOutcome>;
}

/// Non-interactive answers: every confirmation takes its default and every
/// edit session is abandoned, so prompts fall back to their defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl Interaction for Unattended {
    fn confirm(&mut self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn edit(&mut self, _document: &str, _extension: &str) -> Result<EditOutcome> {
        Ok(EditOutcome::Abandoned)
    }
}
