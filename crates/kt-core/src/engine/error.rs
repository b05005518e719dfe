//! Engine error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an action, or the whole run when the recipe does not catch them
#[derive(Debug, Error)]
pub enum EngineError {
    /// The recipe raised (or failed to catch) an error, rendered with its causes
    #[error("recipe execution failed: {0}")]
    Script(String),

    /// An action was called with the wrong argument shape
    #[error("r.{action}: {message}")]
    InvalidArgument {
        action: &'static str,
        message: String,
    },

    /// A prompt field changed between a scalar and a section within one run
    #[error("prompt field '{path}' was declared as a {existing} and later as a {incoming}")]
    SchemaConflict {
        path: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("'{0}' exists and is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to {action} {path}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing or parsing a structured document failed
    #[error("{format} document error: {message}")]
    Document {
        format: &'static str,
        message: String,
    },

    #[error("interactive step failed: {0}")]
    Interaction(#[source] anyhow::Error),
}

impl EngineError {
    pub fn invalid(action: &'static str, message: impl Into<String>) -> Self {
        EngineError::InvalidArgument {
            action,
            message: message.into(),
        }
    }

    /// Render an interpreter error; the Lua error type itself is not `Send`
    pub fn lua(err: mlua::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        EngineError::Script(message)
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

impl From<EngineError> for mlua::Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Script(message) => mlua::Error::RuntimeError(message),
            other => mlua::Error::external(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync + 'static>() {}

    #[test]
    fn test_engine_error_crosses_threads() {
        assert_send_sync::<EngineError>();
        let err: anyhow::Error = EngineError::invalid("declare", "bad").into();
        assert_eq!(err.to_string(), "r.declare: bad");
    }

    #[test]
    fn test_lua_error_keeps_cause() {
        let lua = mlua::Lua::new();
        let fail = lua
            .create_function(|_, ()| -> mlua::Result<()> {
                Err(mlua::Error::external(EngineError::invalid("touch", "no path")))
            })
            .unwrap();
        let err = EngineError::lua(fail.call::<()>(()).unwrap_err());
        assert!(matches!(&err, EngineError::Script(_)));
        assert!(err.to_string().contains("r.touch: no path"));
    }
}
