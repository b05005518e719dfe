//! kt CLI - Run Lua recipes that scaffold projects

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use kt_core::config::ConfigFormat;
use kt_core::tui::{RecipeSelection, RunArgs};
use std::path::PathBuf;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "kt")]
#[command(about = "Run Lua recipes that scaffold projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a recipe file
    Run {
        /// Path to the recipe
        file: PathBuf,

        #[command(flatten)]
        options: CliRunArgs,
    },
    /// Run a recipe from the catalog
    Recipe {
        /// Recipe name
        name: String,

        /// Project the recipe belongs to
        #[arg(short, long)]
        project: Option<String>,

        #[command(flatten)]
        options: CliRunArgs,
    },
    /// Run a project's default recipe
    R {
        /// Catalog project (defaults to the project.yaml in the current directory)
        project: Option<String>,

        #[command(flatten)]
        options: CliRunArgs,
    },
    /// List catalog projects, recipes, templates and assets
    List {
        /// Only list resources of this project
        #[arg(short, long)]
        project: Option<String>,

        /// Catalog directory
        #[arg(long, env = "KT_CATALOG")]
        catalog: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct CliRunArgs {
    /// Catalog directory
    #[arg(long, env = "KT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Config file providing the recipe's values
    #[arg(short, long, conflicts_with = "create_config")]
    pub config: Option<PathBuf>,

    /// Write a config file with every value the recipe asks for, without running it
    #[arg(long = "create-config")]
    pub create_config: Option<PathBuf>,

    /// Format of the generated config file
    #[arg(long, value_enum, requires = "create_config")]
    pub format: Option<ConfigFormat>,

    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,
}

impl From<CliRunArgs> for RunArgs {
    fn from(args: CliRunArgs) -> Self {
        RunArgs {
            catalog: args.catalog,
            config: args.config,
            create_config: args.create_config,
            format: args.format,
            yes: args.yes,
        }
    }
}

fn main() -> Result<()> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { file, options } => {
            kt_core::run(RecipeSelection::File(file), options.into(), CLI_VERSION)
        }
        Command::Recipe {
            name,
            project,
            options,
        } => kt_core::run(
            RecipeSelection::Catalog { name, project },
            options.into(),
            CLI_VERSION,
        ),
        Command::R { project, options } => {
            kt_core::run(RecipeSelection::Project(project), options.into(), CLI_VERSION)
        }
        Command::List { project, catalog } => {
            kt_core::tui::list(catalog.as_deref(), project.as_deref())
        }
    };

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_format_requires_create_config() {
        let parsed = Cli::try_parse_from(["kt", "run", "init.lua", "--format", "yaml"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "kt",
            "run",
            "init.lua",
            "--create-config",
            "kt.yml",
            "--format",
            "yml",
        ])
        .unwrap();
        match parsed.command {
            Command::Run { options, .. } => assert_eq!(options.format, Some(ConfigFormat::Yaml)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_config_conflicts_with_create_config() {
        let parsed = Cli::try_parse_from([
            "kt",
            "r",
            "web",
            "--config",
            "a.toml",
            "--create-config",
            "b.toml",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_recipe_with_project() {
        let parsed = Cli::try_parse_from(["kt", "recipe", "init", "--project", "web", "--yes"]).unwrap();
        match parsed.command {
            Command::Recipe {
                name,
                project,
                options,
            } => {
                assert_eq!(name, "init");
                assert_eq!(project.as_deref(), Some("web"));
                assert!(options.yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
