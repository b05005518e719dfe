//! Resource catalog: where recipes, templates and assets come from
//!
//! The engine only needs [`ResourceLookup`]. A catalog on disk looks like:
//!
//! ```text
//! <root>/
//!   recipes/<name>.lua          unassigned recipes
//!   templates/<name>            unassigned templates
//!   assets/<name>               unassigned assets
//!   projects/<project>/
//!     project.yaml              project manifest
//!     recipes/ templates/ assets/
//! ```

use super::manifest::ProjectManifest;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Kind of catalog resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Recipe,
    Template,
    Asset,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Recipe,
        ResourceKind::Template,
        ResourceKind::Asset,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Recipe => "recipe",
            ResourceKind::Template => "template",
            ResourceKind::Asset => "asset",
        }
    }

    fn dir_name(&self) -> &'static str {
        match self {
            ResourceKind::Recipe => "recipes",
            ResourceKind::Template => "templates",
            ResourceKind::Asset => "assets",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Split `"<scope>::<name>"` into its parts; a bare name has no scope
pub fn split_scope(qualified: &str) -> (Option<&str>, &str) {
    match qualified.split_once("::") {
        Some((scope, name)) if !scope.is_empty() => (Some(scope), name),
        Some((_, name)) => (None, name),
        None => (None, qualified),
    }
}

/// Resolves resource names to content
pub trait ResourceLookup {
    /// `Ok(None)` means the resource does not exist
    fn lookup(&self, scope: Option<&str>, name: &str, kind: ResourceKind)
        -> Result<Option<Vec<u8>>>;
}

/// A catalog that resolves nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCatalog;

impl ResourceLookup for NullCatalog {
    fn lookup(&self, _: Option<&str>, _: &str, _: ResourceKind) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    entries: HashMap<(Option<String>, ResourceKind, String), Vec<u8>>,
    scopes: HashSet<String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        scope: Option<&str>,
        kind: ResourceKind,
        name: &str,
        content: impl Into<Vec<u8>>,
    ) {
        if let Some(scope) = scope {
            self.scopes.insert(scope.to_string());
        }
        self.entries.insert(
            (scope.map(str::to_string), kind, name.to_string()),
            content.into(),
        );
    }

    pub fn with(
        mut self,
        scope: Option<&str>,
        kind: ResourceKind,
        name: &str,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert(scope, kind, name, content);
        self
    }
}

impl ResourceLookup for MemoryCatalog {
    fn lookup(
        &self,
        scope: Option<&str>,
        name: &str,
        kind: ResourceKind,
    ) -> Result<Option<Vec<u8>>> {
        // an unknown scope falls back to unassigned resources
        let scope = scope.filter(|s| self.scopes.contains(*s));
        Ok(self
            .entries
            .get(&(scope.map(str::to_string), kind, name.to_string()))
            .cloned())
    }
}

/// A listed catalog resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CatalogEntry {
    pub kind: ResourceKind,
    pub name: String,
}

/// Catalog stored in a directory tree
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join("projects").join(project)
    }

    /// Load a project's manifest
    pub fn project(&self, project: &str) -> Result<ProjectManifest> {
        let dir = self.project_dir(project);
        if !dir.is_dir() {
            anyhow::bail!("Project '{}' not found.", project);
        }
        ProjectManifest::find_in(&dir)?
            .ok_or_else(|| anyhow::anyhow!("Project '{}' has no project.yaml", project))
    }

    /// Names of the projects in the catalog
    pub fn projects(&self) -> Result<Vec<String>> {
        let dir = self.root.join("projects");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// List resources of a project, or the unassigned ones when `scope` is `None`
    pub fn list(&self, scope: Option<&str>) -> Result<Vec<CatalogEntry>> {
        let base = match scope {
            Some(project) => self.project_dir(project),
            None => self.root.clone(),
        };

        let mut entries = Vec::new();
        for kind in ResourceKind::ALL {
            let dir = base.join(kind.dir_name());
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(&dir)?;
                let mut name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if kind == ResourceKind::Recipe {
                    if let Some(stem) = name.strip_suffix(".lua") {
                        name = stem.to_string();
                    }
                }
                entries.push(CatalogEntry { kind, name });
            }
        }
        Ok(entries)
    }

    fn base_for(&self, scope: Option<&str>) -> PathBuf {
        match scope {
            Some(project) if self.project_dir(project).is_dir() => self.project_dir(project),
            _ => self.root.clone(),
        }
    }

    /// Path a resource resolves to, if it exists
    pub fn resolve(&self, scope: Option<&str>, name: &str, kind: ResourceKind) -> Option<PathBuf> {
        if !is_safe_name(name) {
            return None;
        }
        let dir = self.base_for(scope).join(kind.dir_name());
        let exact = dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }
        if kind == ResourceKind::Recipe {
            let with_ext = dir.join(format!("{}.lua", name));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        None
    }
}

impl ResourceLookup for DirectoryCatalog {
    fn lookup(
        &self,
        scope: Option<&str>,
        name: &str,
        kind: ResourceKind,
    ) -> Result<Option<Vec<u8>>> {
        match self.resolve(scope, name, kind) {
            Some(path) => std::fs::read(&path)
                .map(Some)
                .with_context(|| format!("Failed to read {}", path.display())),
            None => Ok(None),
        }
    }
}

/// Resource names are relative paths that stay inside the catalog
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
