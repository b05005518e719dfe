//! Project manifest types and parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names checked, in order, when looking for a project manifest
pub const MANIFEST_FILES: &[&str] = &["project.yaml", "project.yml", "project.json"];

/// Project manifest (`project.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Project name
    pub name: String,

    /// What the project scaffolds
    #[serde(default)]
    pub description: Option<String>,

    /// Recipe run by `kt r <project>`
    #[serde(default)]
    pub default_recipe: Option<String>,

    /// kt versions the recipes were written for: a minimum version or a semver range
    #[serde(default)]
    pub requires_kt: Option<String>,
}

impl ProjectManifest {
    /// Parse a manifest. JSON manifests parse too, YAML being a superset.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse project manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Manifest path inside `dir`, if there is one
    pub fn path_in(dir: &Path) -> Option<PathBuf> {
        MANIFEST_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the manifest inside `dir`, if there is one
    pub fn find_in(dir: &Path) -> Result<Option<Self>> {
        Self::path_in(dir).map(|path| Self::load(&path)).transpose()
    }
}
