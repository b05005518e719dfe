//! Scoped edit sessions in the user's editor

use crate::engine::EditOutcome;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use std::time::SystemTime;

/// `$VISUAL`, then `$EDITOR`, then `vi`
pub fn editor_command() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Open `document` in the user's editor
pub fn edit_document(document: &str, extension: &str) -> Result<EditOutcome> {
    edit_with(&editor_command(), document, extension)
}

/// Open `document` in a temporary file with `editor` (a shell command line).
///
/// The session counts as abandoned when the editor exits unsuccessfully or
/// leaves the file untouched.
pub fn edit_with(editor: &str, document: &str, extension: &str) -> Result<EditOutcome> {
    let file = tempfile::Builder::new()
        .prefix("kt-")
        .suffix(&format!(".{}", extension))
        .tempfile()
        .context("Failed to create a temporary file for editing")?;
    std::fs::write(file.path(), document)
        .with_context(|| format!("Failed to write {}", file.path().display()))?;
    let before = modified(file.path())?;

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{} \"$1\"", editor))
        .arg("sh")
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to start editor '{}'", editor))?;
    if !status.success() {
        return Ok(EditOutcome::Abandoned);
    }

    let text = std::fs::read_to_string(file.path())
        .with_context(|| format!("Failed to read {}", file.path().display()))?;
    if modified(file.path())? == before && text == document {
        return Ok(EditOutcome::Abandoned);
    }
    Ok(EditOutcome::Saved(text))
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("Failed to stat {}", path.display()))
}
