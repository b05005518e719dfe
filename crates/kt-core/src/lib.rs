//! kt Core - Recipe execution engine for project scaffolding
//!
//! Recipes are small Lua scripts that declare variables, prompt for missing
//! ones, render templates, copy assets, create files and run commands through
//! a fixed set of actions bound as the global `r` table.
//!
//! The same recipe runs in one of two modes: it either applies its side
//! effects, or it derives a config document listing every value it would ask
//! for, in the order the recipe declares them. That document can be edited
//! and fed back to run the recipe without any questions.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Engine** - Context store, value bridge, order recovery, actions and modes
//! - **Layer 2: Collaborators** - Resource catalog, template rendering, config documents, subprocesses
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based front end (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based terminal front end
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use kt_core::{config::ConfigFormat, templates::DirectoryCatalog};
//! use kt_core::engine::{Context, Mode, RecipeEngine};
//!
//! let run = RecipeEngine::new(Context::new(), Mode::GenerateConfig)
//!     .with_catalog(DirectoryCatalog::new("/home/me/.kt"))
//!     .execute(&std::fs::read_to_string("init.lua")?)?;
//! std::fs::write("kt.toml", run.render_config(ConfigFormat::Toml)?)?;
//! ```

pub mod config;
pub mod engine;
pub mod runtime;
pub mod templates;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use config::ConfigFormat;
pub use engine::{
    CompletedRun, Context, EditOutcome, EngineError, Event, Interaction, Mode, RecipeEngine,
    Unattended, Value,
};
pub use templates::{DirectoryCatalog, MemoryCatalog, ResourceKind, ResourceLookup};

#[cfg(feature = "tui")]
pub use tui::run;
