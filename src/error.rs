use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Terminal conditions of a run. Each one aborts the whole batch.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{message}")]
    Usage { message: String, usage: String },

    #[error("file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("file not found: {}", .0.display())]
    CompanionNotFound(PathBuf),

    #[error("invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("{command} timed out after {}s", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },

    #[error("actual output didn't match expected output")]
    OutputMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
        stderr: Option<String>,
    },
}

impl HarnessError {
    /// Extra block printed under the `error:` line, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            HarnessError::Usage { usage, .. } => Some(usage.clone()),
            HarnessError::OutputMismatch {
                expected,
                actual,
                stderr,
            } => {
                let mut block = vec![
                    "EXPECTED --------".to_string(),
                    expected.join("\n"),
                    "ACTUAL ----------".to_string(),
                    actual.join("\n"),
                ];
                if let Some(stderr) = stderr {
                    block.push("STDERR ----------".to_string());
                    block.push(stderr.trim_end().to_string());
                }
                block.push("-----------------".to_string());
                Some(block.join("\n"))
            }
            _ => None,
        }
    }
}
