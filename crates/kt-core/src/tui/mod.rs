//! Terminal front end using cliclack (Charm-style inline prompts)
//!
//! This module is optional and only available when the `tui` feature is enabled.

#[cfg(feature = "tui")]
mod editor;
#[cfg(feature = "tui")]
mod interaction;
#[cfg(feature = "tui")]
mod session;

#[cfg(feature = "tui")]
pub use editor::{edit_document, edit_with, editor_command};
#[cfg(feature = "tui")]
pub use interaction::Terminal;
#[cfg(feature = "tui")]
pub use session::{catalog_root, list, run, RecipeSelection, RunArgs};
