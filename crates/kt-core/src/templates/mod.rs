//! Recipe resources: lookup, rendering, and project manifests
//!
//! This module provides:
//! - Resource lookup by scope, name and kind (`ResourceLookup`, `DirectoryCatalog`)
//! - Template rendering with `{>command<}` substitutions
//! - Project manifest types
//! - Version compatibility checking

pub mod catalog;
pub mod manifest;
pub mod renderer;
pub mod version;

pub use catalog::{
    split_scope, CatalogEntry, DirectoryCatalog, MemoryCatalog, NullCatalog, ResourceKind,
    ResourceLookup,
};
pub use manifest::ProjectManifest;
pub use renderer::{substitute_shell, TemplateRenderer};
pub use version::check_compatibility;
