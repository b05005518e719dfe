//! Recipe execution engine
//!
//! A run executes one Lua recipe once, in one of two modes:
//!
//! - [`Mode::Execute`]: actions apply their side effects, and prompts with
//!   missing values open an edit session
//! - [`Mode::GenerateConfig`]: side effects are suppressed and prompts only
//!   collect their schema, which [`CompletedRun::render_config`] turns into a
//!   config document that can be fed back as the context of a later run
//!
//! # Example
//!
//! ```ignore
//! use kt_core::engine::{Context, Mode, RecipeEngine};
//! use kt_core::config::ConfigFormat;
//!
//! let run = RecipeEngine::new(Context::new(), Mode::GenerateConfig)
//!     .execute(r#"r.prompt({app = {name = {default = "app"}}})"#)?;
//! let document = run.render_config(ConfigFormat::Toml)?;
//! ```

pub mod actions;
pub mod bridge;
pub mod context;
pub mod error;
pub mod interaction;
pub mod order;
pub mod prompts;
pub mod report;
pub mod run;
pub mod value;

pub use actions::RecipeActions;
pub use context::Context;
pub use error::{EngineError, Result};
pub use interaction::{EditOutcome, Interaction, Unattended};
pub use order::RecipeSource;
pub use prompts::{PromptField, PromptNode, PromptSection};
pub use report::Event;
pub use run::{ConfigTemplate, Mode, Run};
pub use value::{Map, Value};

use crate::config::ConfigFormat;
use crate::templates::{NullCatalog, ResourceLookup, TemplateRenderer};
use actions::Dispatcher;
use mlua::{Lua, LuaOptions, StdLib, Value as LuaValue};
use std::rc::Rc;

/// Configures and starts recipe runs
pub struct RecipeEngine {
    mode: Mode,
    context: Context,
    catalog: Box<dyn ResourceLookup>,
    interaction: Box<dyn Interaction>,
    edit_format: ConfigFormat,
    config_template: Option<ConfigTemplate>,
    echo: bool,
}

impl RecipeEngine {
    /// An engine with no catalog that answers every interaction with its default
    pub fn new(context: Context, mode: Mode) -> Self {
        Self {
            mode,
            context,
            catalog: Box::new(NullCatalog),
            interaction: Box::new(Unattended),
            edit_format: ConfigFormat::default(),
            config_template: None,
            echo: true,
        }
    }

    pub fn with_catalog(mut self, catalog: impl ResourceLookup + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    pub fn with_interaction(mut self, interaction: impl Interaction + 'static) -> Self {
        self.interaction = Box::new(interaction);
        self
    }

    /// Format of the document opened by prompt edit sessions
    pub fn with_edit_format(mut self, format: ConfigFormat) -> Self {
        self.edit_format = format;
        self
    }

    /// Render the config document through `content` instead of serializing it.
    /// A recipe calling `r.config` replaces this.
    pub fn with_config_template(
        mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.config_template = Some(ConfigTemplate {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    /// Don't print events as they happen; they are still recorded
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Run a recipe to completion. The first uncaught error aborts the run
    /// and its state is discarded.
    pub fn execute(self, source: &str) -> Result<CompletedRun> {
        let mut run = Run::new(self.mode, self.context);
        run.config_template = self.config_template;

        let dispatcher = Rc::new(Dispatcher::new(
            run,
            RecipeSource::new(source),
            self.catalog,
            self.interaction,
            self.edit_format,
            self.echo,
        ));

        let lua = sandbox().map_err(EngineError::lua)?;
        actions::install(&lua, Rc::clone(&dispatcher)).map_err(EngineError::lua)?;
        let result = lua.load(source).set_name("recipe").exec();
        drop(lua);
        result.map_err(EngineError::lua)?;

        Ok(CompletedRun::from(dispatcher.take_run()))
    }
}

/// Interpreter with the pure libraries only
fn sandbox() -> mlua::Result<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE,
        LuaOptions::default(),
    )?;
    let globals = lua.globals();
    for name in ["dofile", "loadfile"] {
        globals.raw_set(name, LuaValue::Nil)?;
    }
    Ok(lua)
}

/// State left behind by a successful run
#[derive(Debug)]
pub struct CompletedRun {
    mode: Mode,
    context: Context,
    collected: PromptSection,
    config_template: Option<ConfigTemplate>,
    events: Vec<Event>,
}

impl From<Run> for CompletedRun {
    fn from(run: Run) -> Self {
        Self {
            mode: run.mode,
            context: run.context,
            collected: run.collected,
            config_template: run.config_template,
            events: run.events,
        }
    }
}

impl CompletedRun {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Schema of every prompt seen during the run, in declaration order
    pub fn collected_prompts(&self) -> &PromptSection {
        &self.collected
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Name of the template the config document is rendered with, if any
    pub fn config_template(&self) -> Option<&str> {
        self.config_template.as_ref().map(|t| t.name.as_str())
    }

    /// The collected prompt tree with each field's current value
    pub fn config_values(&self) -> Map {
        self.collected.resolve(&self.context)
    }

    /// Render the config document.
    ///
    /// With a config template, the template is rendered against the collected
    /// values overlaid with the whole context, and `format` is ignored.
    /// `{>command<}` substitutions are left untouched.
    pub fn render_config(&self, format: ConfigFormat) -> Result<String> {
        let values = Value::Map(self.config_values());
        match &self.config_template {
            Some(template) => {
                let mut data = values;
                data.merge(self.context.to_value());
                TemplateRenderer::new()
                    .render_variables(&template.content, &data)
                    .map_err(|e| EngineError::Document {
                        format: "template",
                        message: format!("{:#}", e),
                    })
            }
            None => format.serialize(&values),
        }
    }
}
