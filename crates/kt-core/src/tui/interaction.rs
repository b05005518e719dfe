//! Interactive steps on a terminal

use super::editor::{edit_with, editor_command};
use crate::engine::{EditOutcome, Interaction};
use anyhow::Result;

/// Asks on the terminal and edits documents in `$VISUAL`/`$EDITOR`
#[derive(Debug, Clone, Copy, Default)]
pub struct Terminal;

impl Interaction for Terminal {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        let answer = cliclack::confirm(prompt).initial_value(default).interact()?;
        Ok(answer)
    }

    fn edit(&mut self, document: &str, extension: &str) -> Result<EditOutcome> {
        let editor = editor_command();
        cliclack::log::info(format!("Opening {} to fill in the recipe's values", editor))?;
        edit_with(&editor, document, extension)
    }
}
