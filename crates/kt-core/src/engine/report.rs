//! Per-action outcomes reported to the user and kept in the run log

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;

/// Something an action did, or declined to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Rendered(PathBuf),
    Copied(PathBuf),
    Touched(PathBuf),
    CreatedDir(PathBuf),
    /// Destination existed and `overwrite` was not set
    Skipped(PathBuf),
    /// A subprocess is about to run
    Running(Vec<String>),
    CommandFailed {
        command: Vec<String>,
        detail: String,
    },
    NotFound {
        kind: &'static str,
        name: String,
    },
    /// An edited document or a template could not be processed
    Failed {
        what: String,
        detail: String,
    },
    /// An edit session was closed without saving
    UsedDefaults,
    ConfigTemplate(String),
}

impl Event {
    /// True for outcomes that touched the file system or spawned a process
    pub fn is_side_effect(&self) -> bool {
        matches!(
            self,
            Event::Rendered(_)
                | Event::Copied(_)
                | Event::Touched(_)
                | Event::CreatedDir(_)
                | Event::Running(_)
        )
    }

    /// Print the event to stderr
    pub fn report(&self) {
        match self {
            Event::Rendered(_) | Event::Copied(_) | Event::Touched(_) | Event::CreatedDir(_) => {
                eprintln!("{}", self.to_string().green())
            }
            Event::Skipped(_) | Event::UsedDefaults => eprintln!("{}", self.to_string().yellow()),
            Event::Running(_) | Event::ConfigTemplate(_) => {
                eprintln!("{}", self.to_string().dimmed())
            }
            Event::CommandFailed { .. } | Event::NotFound { .. } | Event::Failed { .. } => {
                eprintln!("{}", self.to_string().red())
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Rendered(path) => write!(f, "Rendered {}", path.display()),
            Event::Copied(path) => write!(f, "Copied asset {}", path.display()),
            Event::Touched(path) => write!(f, "Wrote {}", path.display()),
            Event::CreatedDir(path) => write!(f, "Created directory {}", path.display()),
            Event::Skipped(path) => write!(f, "Skipping '{}', exists.", path.display()),
            Event::Running(command) => write!(f, "Running: {}", command.join(" ")),
            Event::CommandFailed { command, detail } => {
                write!(f, "Command failed: {}: {}", command.join(" "), detail)
            }
            Event::NotFound { kind, name } => write!(f, "{} '{}' not found.", capitalize(kind), name),
            Event::Failed { what, detail } => write!(f, "Error {}: {}", what, detail),
            Event::UsedDefaults => write!(f, "No input provided, using defaults."),
            Event::ConfigTemplate(name) => write!(f, "Using config template '{}'", name),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
