//! Per-stack configuration.
//!
//! Each stack has a YAML file `Appstack.<stack>.yaml` next to the program.
//! Values are plain strings, or secrets written as `{ secret: ... }`:
//!
//! ```yaml
//! location: uksouth
//! sqlPassword:
//!   secret: correct-horse-battery
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILE_PREFIX, REDACTED};
use crate::secret::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),

  #[error("missing required configuration value '{key}'")]
  Missing { key: String },

  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write config file {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to serialize config: {0}")]
  Serialize(#[source] serde_yaml::Error),
}

/// A single configuration value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
  Plain(String),
  Secret { secret: String },
}

impl ConfigValue {
  pub fn is_secret(&self) -> bool {
    matches!(self, ConfigValue::Secret { .. })
  }

  fn as_str(&self) -> &str {
    match self {
      ConfigValue::Plain(value) => value,
      ConfigValue::Secret { secret } => secret,
    }
  }
}

impl fmt::Debug for ConfigValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigValue::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
      ConfigValue::Secret { .. } => f.debug_tuple("Secret").field(&REDACTED).finish(),
    }
  }
}

/// Configuration of one stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackConfig {
  values: BTreeMap<String, ConfigValue>,
}

/// Path of a stack's config file within a project directory.
pub fn config_path(project_dir: &Path, stack: &str) -> PathBuf {
  project_dir.join(format!("{CONFIG_FILE_PREFIX}.{stack}.yaml"))
}

impl StackConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Loads a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ConfigError::NotFound(path.to_path_buf())),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    // An empty file parses as null, not as an empty map.
    if content.trim().is_empty() {
      return Ok(Self::default());
    }

    let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded stack config");
    Ok(config)
  }

  /// Loads a config file, or returns an empty config if there is none.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    match Self::load(path) {
      Err(ConfigError::NotFound(_)) => Ok(Self::default()),
      other => other,
    }
  }

  pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
    let content = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "saved stack config");
    Ok(())
  }

  /// Returns a value, secret or not, as plain text.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(ConfigValue::as_str)
  }

  pub fn is_secret(&self, key: &str) -> bool {
    self.values.get(key).is_some_and(ConfigValue::is_secret)
  }

  pub fn require(&self, key: &str) -> Result<String, ConfigError> {
    self.get(key).map(str::to_string).ok_or_else(|| ConfigError::Missing {
      key: key.to_string(),
    })
  }

  /// Returns a required value wrapped as a [`Secret`].
  ///
  /// The value does not have to be stored as a secret.
  pub fn require_secret(&self, key: &str) -> Result<Secret, ConfigError> {
    self.get(key).map(Secret::new).ok_or_else(|| ConfigError::Missing {
      key: key.to_string(),
    })
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, secret: bool) {
    let value = value.into();
    let value = if secret {
      ConfigValue::Secret { secret: value }
    } else {
      ConfigValue::Plain(value)
    };
    self.values.insert(key.into(), value);
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.values.keys().map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  #[test]
  fn config_path_uses_stack_name() {
    assert_eq!(
      config_path(Path::new("/proj"), "testing"),
      PathBuf::from("/proj/Appstack.testing.yaml")
    );
  }

  #[test]
  fn parses_plain_and_secret_values() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Appstack.dev.yaml");
    std::fs::write(&path, "location: uksouth\nsqlPassword:\n  secret: correct-horse-battery\n").unwrap();

    let config = StackConfig::load(&path).unwrap();
    assert_eq!(config.require("location").unwrap(), "uksouth");
    assert!(!config.is_secret("location"));
    assert!(config.is_secret("sqlPassword"));
    assert_eq!(config.require_secret("sqlPassword").unwrap().expose(), "correct-horse-battery");
  }

  #[test]
  fn missing_required_value() {
    let config = StackConfig::new();
    let err = config.require("location").unwrap_err();
    assert!(matches!(err, ConfigError::Missing { ref key } if key == "location"));
    assert_eq!(err.to_string(), "missing required configuration value 'location'");
    assert!(config.require_secret("sqlPassword").is_err());
  }

  #[test]
  fn save_then_load_keeps_secret_shape() {
    let temp = TempDir::new().unwrap();
    let path = config_path(temp.path(), "dev");

    let mut config = StackConfig::new();
    config.set("location", "uksouth", false);
    config.set("sqlPassword", "correct-horse-battery", true);
    config.save(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("secret: correct-horse-battery"));
    assert_eq!(StackConfig::load(&path).unwrap(), config);
  }

  #[test]
  fn missing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Appstack.none.yaml");
    assert!(matches!(StackConfig::load(&path), Err(ConfigError::NotFound(_))));
    assert!(StackConfig::load_or_default(&path).unwrap().is_empty());
  }

  #[test]
  fn empty_file_is_empty_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("Appstack.dev.yaml");
    std::fs::write(&path, "\n").unwrap();
    assert!(StackConfig::load(&path).unwrap().is_empty());
  }

  #[test]
  fn debug_never_shows_secrets() {
    let mut config = StackConfig::new();
    config.set("sqlPassword", "correct-horse-battery", true);
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("correct-horse"));
    assert!(rendered.contains("[secret]"));
  }
}
