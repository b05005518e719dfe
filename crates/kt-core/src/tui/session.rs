//! Recipe sessions on the terminal: pick a recipe, run it, write the config

use super::interaction::Terminal;
use crate::config::{self, ConfigFormat};
use crate::engine::{Context, Event, Mode, RecipeEngine, Unattended};
use crate::templates::{
    version, DirectoryCatalog, ProjectManifest, ResourceKind, ResourceLookup,
};
use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Environment variable naming the catalog directory
pub const CATALOG_ENV: &str = "KT_CATALOG";

const UPGRADE_COMMAND: &str = "cargo install kt --force";

/// Options shared by every way of running a recipe
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Catalog directory (defaults to `$KT_CATALOG`, then `~/.kt`)
    pub catalog: Option<PathBuf>,

    /// Config document used as the initial context
    pub config: Option<PathBuf>,

    /// Generate a config document at this path instead of executing
    pub create_config: Option<PathBuf>,

    /// Format of the generated config document
    pub format: Option<ConfigFormat>,

    /// Answer every question with its default (non-interactive mode)
    pub yes: bool,
}

impl RunArgs {
    pub fn mode(&self) -> Mode {
        if self.create_config.is_some() {
            Mode::GenerateConfig
        } else {
            Mode::Execute
        }
    }

    /// Reject option combinations that make no sense
    pub fn validate(&self) -> Result<()> {
        if self.config.is_some() && self.create_config.is_some() {
            anyhow::bail!("--config and --create-config cannot be used together.");
        }
        if self.format.is_some() && self.create_config.is_none() {
            anyhow::bail!("--format can only be used with --create-config.");
        }
        Ok(())
    }
}

/// Which recipe to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeSelection {
    /// A recipe file on disk
    File(PathBuf),
    /// A recipe in the catalog, optionally inside a project
    Catalog {
        name: String,
        project: Option<String>,
    },
    /// A project's default recipe; `None` uses the project in the working directory
    Project(Option<String>),
}

/// A recipe ready to run
struct LoadedRecipe {
    label: String,
    source: String,
}

/// Catalog directory from the argument, `$KT_CATALOG` or `~/.kt`
pub fn catalog_root(arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CATALOG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Cannot locate the catalog: set {} or HOME", CATALOG_ENV))?;
    Ok(PathBuf::from(home).join(".kt"))
}

/// Run a recipe with terminal prompts
pub fn run(selection: RecipeSelection, args: RunArgs, cli_version: &str) -> Result<()> {
    args.validate()?;
    cliclack::intro("kt")?;

    let catalog = DirectoryCatalog::new(catalog_root(args.catalog.as_deref())?);
    let recipe = load_recipe(&catalog, &selection, cli_version)?;

    let context = match &args.config {
        Some(path) => {
            let context = config::load_context(path)?;
            cliclack::log::info(format!("Using config {}", path.display()))?;
            context
        }
        None => Context::new(),
    };

    let mode = args.mode();
    if mode == Mode::GenerateConfig {
        cliclack::log::info("Generating config, no changes will be made")?;
    }
    cliclack::log::step(format!("Running {}", recipe.label))?;

    let engine = RecipeEngine::new(context, mode).with_catalog(catalog);
    let engine = if args.yes {
        engine.with_interaction(Unattended)
    } else {
        engine.with_interaction(Terminal)
    };
    let completed = engine
        .execute(&recipe.source)
        .with_context(|| format!("Recipe {} failed", recipe.label))?;

    if let Some(path) = &args.create_config {
        if completed.config_template().is_some() && args.format.is_some() {
            anyhow::bail!("--format cannot be used with a recipe that selects a config template.");
        }
        let format = args
            .format
            .or_else(|| ConfigFormat::from_path(path))
            .unwrap_or_default();
        let document = completed.render_config(format)?;
        config::write_document(path, &document)?;
        cliclack::outro(format!("Config written to {}", path.display()))?;
        return Ok(());
    }

    let problems = completed
        .events()
        .iter()
        .filter(|event| {
            matches!(
                event,
                Event::CommandFailed { .. } | Event::NotFound { .. } | Event::Failed { .. }
            )
        })
        .count();
    if problems > 0 {
        cliclack::outro(format!("Done with {} problem(s), see above.", problems).yellow())?;
    } else {
        cliclack::outro("Done!")?;
    }
    Ok(())
}

fn load_recipe(
    catalog: &DirectoryCatalog,
    selection: &RecipeSelection,
    cli_version: &str,
) -> Result<LoadedRecipe> {
    match selection {
        RecipeSelection::File(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read recipe {}", path.display()))?;
            Ok(LoadedRecipe {
                label: path.display().to_string(),
                source,
            })
        }
        RecipeSelection::Catalog { name, project } => {
            let source = lookup_recipe(catalog, project.as_deref(), name)?;
            let label = match project {
                Some(project) => format!("{}::{}", project, name),
                None => name.clone(),
            };
            Ok(LoadedRecipe { label, source })
        }
        RecipeSelection::Project(Some(project)) => {
            let manifest = catalog.project(project)?;
            warn_if_incompatible(&manifest, cli_version)?;
            let name = default_recipe(&manifest)?;
            Ok(LoadedRecipe {
                label: format!("{}::{}", project, name),
                source: lookup_recipe(catalog, Some(project.as_str()), name)?,
            })
        }
        RecipeSelection::Project(None) => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            let manifest = ProjectManifest::find_in(&cwd)?.ok_or_else(|| {
                anyhow::anyhow!("No project.yaml in the current directory. Pass a project name.")
            })?;
            warn_if_incompatible(&manifest, cli_version)?;
            let name = default_recipe(&manifest)?;
            let local = DirectoryCatalog::new(&cwd);
            Ok(LoadedRecipe {
                label: format!("{}::{}", manifest.name, name),
                source: lookup_recipe(&local, None, name)?,
            })
        }
    }
}

fn lookup_recipe(catalog: &DirectoryCatalog, project: Option<&str>, name: &str) -> Result<String> {
    let content = catalog
        .lookup(project, name, ResourceKind::Recipe)?
        .ok_or_else(|| anyhow::anyhow!("Recipe '{}' not found.", name))?;
    String::from_utf8(content).with_context(|| format!("Recipe '{}' is not valid UTF-8", name))
}

fn default_recipe(manifest: &ProjectManifest) -> Result<&str> {
    manifest
        .default_recipe
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Project '{}' has no default recipe.", manifest.name))
}

fn warn_if_incompatible(manifest: &ProjectManifest, cli_version: &str) -> Result<()> {
    let Some(required) = &manifest.requires_kt else {
        return Ok(());
    };
    if let Some(warning) = version::check_compatibility(cli_version, required, UPGRADE_COMMAND) {
        cliclack::log::warning(warning)?;
    }
    Ok(())
}

/// Print the projects and resources of a catalog
pub fn list(catalog: Option<&Path>, project: Option<&str>) -> Result<()> {
    let catalog = DirectoryCatalog::new(catalog_root(catalog)?);

    if project.is_none() {
        let projects = catalog.projects()?;
        if !projects.is_empty() {
            println!("{}", "Projects".bold());
            for name in projects {
                let description = catalog
                    .project(&name)
                    .ok()
                    .and_then(|manifest| manifest.description)
                    .map(|d| format!("  {}", d.dimmed()))
                    .unwrap_or_default();
                println!("  {}{}", name, description);
            }
            println!();
        }
    }

    let entries = catalog.list(project)?;
    if entries.is_empty() {
        println!("{}", "Nothing in the catalog yet.".dimmed());
        return Ok(());
    }
    for kind in ResourceKind::ALL {
        let names: Vec<&str> = entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.name.as_str())
            .collect();
        if names.is_empty() {
            continue;
        }
        println!("{}", format!("{}s", capitalize(kind.name())).bold());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
