//! Child process execution for `r.run` and `{>command<}` substitutions

use std::fmt;
use std::path::Path;
use std::process::Command;

/// Why a child process did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The program could not be started
    Spawn(String),
    /// The program ran and exited unsuccessfully
    Exit { code: Option<i32>, stderr: String },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Spawn(err) => write!(f, "failed to start: {}", err),
            ProcessError::Exit { code: Some(code), .. } => {
                write!(f, "exited with status {}", code)
            }
            ProcessError::Exit { code: None, .. } => write!(f, "terminated by signal"),
        }
    }
}

/// Run a program with inherited stdio and wait for it
pub fn run_inherited(parts: &[String], cwd: Option<&Path>) -> Result<(), ProcessError> {
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| ProcessError::Spawn("empty command".to_string()))?;

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let status = command
        .status()
        .map_err(|e| ProcessError::Spawn(e.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::Exit {
            code: status.code(),
            stderr: String::new(),
        })
    }
}

/// Run a shell command line and capture its trimmed standard output
pub fn capture_shell(command_line: &str) -> Result<String, ProcessError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command_line)
        .output()
        .map_err(|e| ProcessError::Spawn(e.to_string()))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(ProcessError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_shell_trims_output() {
        assert_eq!(capture_shell("echo '  hello  '").unwrap(), "hello");
    }

    #[test]
    fn test_capture_shell_failure() {
        let err = capture_shell("echo oops >&2; exit 3").unwrap_err();
        assert_eq!(
            err,
            ProcessError::Exit {
                code: Some(3),
                stderr: "oops".to_string()
            }
        );
    }

    #[test]
    fn test_run_inherited_status() {
        assert!(run_inherited(&["true".to_string()], None).is_ok());
        assert!(matches!(
            run_inherited(&["false".to_string()], None),
            Err(ProcessError::Exit { code: Some(1), .. })
        ));
    }

    #[test]
    fn test_run_inherited_missing_program() {
        let err = run_inherited(&["kt-definitely-not-a-program".to_string()], None).unwrap_err();
        assert!(matches!(err, ProcessError::Spawn(_)));
        assert!(run_inherited(&[], None).is_err());
    }

    #[test]
    fn test_run_inherited_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec!["touch".to_string(), "marker".to_string()];
        run_inherited(&parts, Some(dir.path())).unwrap();
        assert!(dir.path().join("marker").exists());
    }
}
