use std::{
    fmt,
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::Local;

/// Timestamped run log. Disabled logs swallow every entry.
pub struct RunLog {
    file: Option<File>,
}

impl RunLog {
    pub fn disabled() -> Self {
        RunLog { file: None }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Ok(RunLog { file: Some(file) })
    }

    pub fn entry(&mut self, tag: &str, message: fmt::Arguments<'_>) -> Result<()> {
        if let Some(file) = &mut self.file {
            writeln!(
                file,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                tag,
                message
            )
            .context("failed to write log entry")?;
        }
        Ok(())
    }
}
