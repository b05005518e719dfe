//! Config documents: loading an initial context and writing generated skeletons

pub mod format;

pub use format::ConfigFormat;

use crate::engine::Context;
use anyhow::{Context as _, Result};
use std::path::Path;

/// Load a config document (format chosen by extension, TOML otherwise) as a context
pub fn load_context(path: &Path) -> Result<Context> {
    let format = ConfigFormat::from_path(path).unwrap_or_default();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let value = format
        .parse(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Context::from_value(value).ok_or_else(|| {
        anyhow::anyhow!(
            "Config file {} must contain a table at the top level",
            path.display()
        )
    })
}

/// Write a generated document, creating parent directories
pub fn write_document(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}
