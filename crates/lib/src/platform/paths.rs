use std::path::PathBuf;

use crate::consts::{APP_NAME, HOME_ENV};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the directory for data files for the application.
///
/// `APPSTACK_HOME` takes precedence over the platform default.
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Ok(home) = std::env::var(HOME_ENV) {
    return PathBuf::from(home);
  }
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir())
    .join(APP_NAME)
}

/// Returns the directory for data files for the application.
///
/// `APPSTACK_HOME` takes precedence over the platform default.
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Ok(home) = std::env::var(HOME_ENV) {
    return PathBuf::from(home);
  }
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Returns the directory holding stack state documents.
pub fn stacks_dir() -> PathBuf {
  data_dir().join("stacks")
}
