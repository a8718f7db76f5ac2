use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{error::HarnessError, scan::Syntax};

/// File picked up from the input file's directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "codegen-tester.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
    #[serde(default = "default_companion_extension")]
    companion_extension: String,
    #[serde(default = "default_marker")]
    marker: String,
    #[serde(default = "default_comment_prefix")]
    comment_prefix: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            timeout_secs: default_timeout(),
            companion_extension: default_companion_extension(),
            marker: default_marker(),
            comment_prefix: default_comment_prefix(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_companion_extension() -> String {
    "out".into()
}

fn default_marker() -> String {
    "//TESTCASE:".into()
}

fn default_comment_prefix() -> String {
    "//".into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub timeout: Duration,
    pub companion_extension: String,
    pub marker: String,
    pub comment_prefix: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let file = ConfigFile::default();
        HarnessConfig {
            timeout: Duration::from_secs(file.timeout_secs),
            companion_extension: file.companion_extension,
            marker: file.marker,
            comment_prefix: file.comment_prefix,
        }
    }
}

impl HarnessConfig {
    /// Resolves the configuration for `input`: an explicit file wins, then
    /// [`CONFIG_FILE_NAME`] next to the input, then the built-in defaults.
    /// `timeout_override` replaces whatever timeout the file set.
    pub fn load(
        explicit: Option<&Path>,
        input: &Path,
        timeout_override: Option<u64>,
    ) -> Result<HarnessConfig> {
        let (path, mut file) = match explicit {
            Some(path) => (path.to_path_buf(), read_config(path)?),
            None => {
                let path = discovered_path(input);
                if path.is_file() {
                    let file = read_config(&path)?;
                    (path, file)
                } else {
                    (path, ConfigFile::default())
                }
            }
        };

        if let Some(secs) = timeout_override {
            file.timeout_secs = secs;
        }
        validate(&path, file)
    }

    pub fn syntax(&self) -> Syntax<'_> {
        Syntax {
            marker: &self.marker,
            comment_prefix: &self.comment_prefix,
        }
    }

    /// Path of the binary built from `input`: same stem, companion extension.
    pub fn companion_path(&self, input: &Path) -> PathBuf {
        input.with_extension(&self.companion_extension)
    }
}

fn discovered_path(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME)
}

fn read_config(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config {}", path.display()))
}

fn validate(path: &Path, file: ConfigFile) -> Result<HarnessConfig> {
    let invalid = |message: &str| HarnessError::Config {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    if file.timeout_secs == 0 {
        return Err(invalid("timeout must be at least one second").into());
    }
    if file.companion_extension.is_empty() || file.companion_extension.starts_with('.') {
        return Err(invalid("companion_extension must be non-empty and have no leading dot").into());
    }
    if file.marker.is_empty() {
        return Err(invalid("marker must not be empty").into());
    }
    if file.comment_prefix.is_empty() {
        return Err(invalid("comment_prefix must not be empty").into());
    }

    Ok(HarnessConfig {
        timeout: Duration::from_secs(file.timeout_secs),
        companion_extension: file.companion_extension,
        marker: file.marker,
        comment_prefix: file.comment_prefix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fib.vsl");
        let config = HarnessConfig::load(None, &input, None).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.companion_path(&input), dir.path().join("fib.out"));
    }

    #[test]
    fn discovers_file_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE_NAME, "timeout_secs = 2\ncompanion_extension = \"bin\"\n");
        let input = dir.path().join("prog.vsl");
        let config = HarnessConfig::load(None, &input, None).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.companion_path(&input), dir.path().join("prog.bin"));
        assert_eq!(config.marker, "//TESTCASE:");
    }

    #[test]
    fn cli_timeout_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "custom.toml", "timeout_secs = 2\n");
        let input = dir.path().join("prog.vsl");
        let config = HarnessConfig::load(Some(&path), &input, Some(9)).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(9));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = HarnessConfig::load(Some(&missing), &dir.path().join("a.vsl"), None)
            .unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.toml", "timeout = 3\n");
        let err = HarnessConfig::load(Some(&path), &dir.path().join("a.vsl"), None).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = HarnessConfig::load(None, &dir.path().join("a.vsl"), Some(0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::Config { .. })
        ));
    }

    #[test]
    fn leading_dot_extension_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c.toml", "companion_extension = \".out\"\n");
        let err = HarnessConfig::load(Some(&path), &dir.path().join("a.vsl"), None).unwrap_err();
        assert!(err.to_string().contains("companion_extension"));
    }

    #[test]
    fn extensionless_input_gets_extension_appended() {
        let config = HarnessConfig::default();
        assert_eq!(
            config.companion_path(Path::new("tests/prog")),
            PathBuf::from("tests/prog.out")
        );
        assert_eq!(
            config.companion_path(Path::new("dir.v1/prog.vsl")),
            PathBuf::from("dir.v1/prog.out")
        );
    }
}
