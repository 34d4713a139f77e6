//! State storage.
//!
//! # Storage Layout
//!
//! ```text
//! {data_dir}/stacks/
//! └── <project>/
//!     └── <stack>.json    # StackState
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::platform::paths::stacks_dir;

use super::types::{STATE_VERSION, StackState, StateError};

/// Reads and writes stack state documents.
#[derive(Debug, Clone)]
pub struct StateStore {
  base_path: PathBuf,
}

impl StateStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// A store at the default location (`$APPSTACK_HOME/stacks` or the
  /// platform data directory).
  pub fn default_store() -> Self {
    Self::new(stacks_dir())
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  fn project_dir(&self, project: &str) -> PathBuf {
    self.base_path.join(project)
  }

  fn state_path(&self, project: &str, stack: &str) -> PathBuf {
    self.project_dir(project).join(format!("{stack}.json"))
  }

  /// Whether a state document exists for the stack.
  pub fn exists(&self, project: &str, stack: &str) -> bool {
    self.state_path(project, stack).is_file()
  }

  /// Loads a stack's state. Returns `Ok(None)` if the stack has none.
  pub fn load(&self, project: &str, stack: &str) -> Result<Option<StackState>, StateError> {
    let path = self.state_path(project, stack);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(StateError::Read(e)),
    };

    let state: StackState = serde_json::from_str(&content).map_err(StateError::Parse)?;
    if state.version != STATE_VERSION {
      return Err(StateError::UnsupportedVersion(state.version));
    }

    Ok(Some(state))
  }

  /// Saves a stack's state.
  ///
  /// Writes to a temp file and renames it over the previous document.
  pub fn save(&self, state: &StackState) -> Result<(), StateError> {
    let dir = self.project_dir(&state.project);
    fs::create_dir_all(&dir).map_err(StateError::CreateDir)?;

    let path = self.state_path(&state.project, &state.stack);
    let temp_path = dir.join(format!("{}.json.tmp", state.stack));

    let content = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;
    fs::write(&temp_path, &content).map_err(StateError::Write)?;
    fs::rename(&temp_path, &path).map_err(StateError::Write)?;

    debug!(path = %path.display(), resources = state.resources.len(), "saved stack state");
    Ok(())
  }

  /// Stack names with a state document in a project, sorted.
  pub fn list(&self, project: &str) -> Result<Vec<String>, StateError> {
    let entries = match fs::read_dir(self.project_dir(project)) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(StateError::Read(e)),
    };

    let mut stacks = Vec::new();
    for entry in entries {
      let path = entry.map_err(StateError::Read)?.path();
      if path.extension().is_some_and(|ext| ext == "json")
        && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
      {
        stacks.push(stem.to_string());
      }
    }
    stacks.sort();
    Ok(stacks)
  }
}
