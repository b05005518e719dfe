//! Per-run state

use super::context::Context;
use super::prompts::PromptSection;
use super::report::Event;

/// Whether a run applies side effects or only derives a config skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Side-effecting actions run for real
    #[default]
    Execute,
    /// Side-effecting actions are suppressed; prompts collect their defaults
    GenerateConfig,
}

impl Mode {
    pub fn performs_side_effects(self) -> bool {
        matches!(self, Mode::Execute)
    }
}

/// Secondary template used to render the config document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    pub name: String,
    pub content: String,
}

/// Everything one execution of a recipe reads and writes
#[derive(Debug, Default)]
pub struct Run {
    pub mode: Mode,
    pub context: Context,
    /// Accumulated schema of every `r.prompt` and stored `r.gate`
    pub collected: PromptSection,
    /// Number of `r.prompt` calls evaluated so far
    pub prompt_calls: usize,
    pub config_template: Option<ConfigTemplate>,
    pub events: Vec<Event>,
}

impl Run {
    pub fn new(mode: Mode, context: Context) -> Self {
        Self {
            mode,
            context,
            ..Self::default()
        }
    }
}
