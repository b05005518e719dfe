//! Child process helpers
//!
//! This module provides:
//! - Running recipe commands with inherited stdio (`r.run`)
//! - Capturing shell output for template substitutions

pub mod process;

pub use process::{capture_shell, run_inherited, ProcessError};
