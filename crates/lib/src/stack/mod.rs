//! Stacks: named deployment instances of a project.
//!
//! A [`Workspace`] ties a project directory (where per-stack config files
//! live) to a [`StateStore`]. A [`Stack`] is one named instance within it,
//! with its own configuration and state, and is the entry point for
//! `preview` and `up`.

mod program;

pub use program::{Program, ProgramError};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, StackConfig, config_path};
use crate::consts::INPUT_SALT_KEY;
use crate::engine::{self, EngineConfig, EngineError, Preview, ProvisionError, UpResult};
use crate::graph::Context;
use crate::provider::Provider;
use crate::resource::ResourceName;
use crate::secret::Secret;
use crate::state::{ExportValue, ResourceRecord, StackState, StateError, StateStore};

#[derive(Debug, Error)]
pub enum StackError {
  #[error("stack '{stack}' already exists in project '{project}'")]
  StackExists { project: String, stack: String },

  #[error("stack '{stack}' not found in project '{project}'")]
  StackNotFound { project: String, stack: String },

  #[error("invalid stack name '{0}': use letters, digits, '-', '_' or '.'")]
  InvalidName(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Program(#[from] ProgramError),

  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error(transparent)]
  Provision(#[from] ProvisionError),
}

/// A project directory and the store holding its stacks' state.
#[derive(Debug, Clone)]
pub struct Workspace {
  project: String,
  project_dir: PathBuf,
  store: StateStore,
}

impl Workspace {
  pub fn new(project: impl Into<String>, project_dir: impl Into<PathBuf>, store: StateStore) -> Self {
    Self {
      project: project.into(),
      project_dir: project_dir.into(),
      store,
    }
  }

  pub fn project(&self) -> &str {
    &self.project
  }

  pub fn project_dir(&self) -> &Path {
    &self.project_dir
  }

  pub fn store(&self) -> &StateStore {
    &self.store
  }

  /// Names of every stack of the project, sorted.
  pub fn stacks(&self) -> Result<Vec<String>, StackError> {
    Ok(self.store.list(&self.project)?)
  }
}

/// One named stack of a workspace.
#[derive(Debug, Clone)]
pub struct Stack {
  workspace: Workspace,
  name: String,
}

fn validate_name(name: &str) -> Result<(), StackError> {
  let valid = !name.is_empty()
    && !name.starts_with('.')
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
  if valid {
    Ok(())
  } else {
    Err(StackError::InvalidName(name.to_string()))
  }
}

impl Stack {
  /// Creates a new stack with empty state.
  pub fn create(workspace: &Workspace, name: &str) -> Result<Self, StackError> {
    validate_name(name)?;
    if workspace.store.exists(&workspace.project, name) {
      return Err(StackError::StackExists {
        project: workspace.project.clone(),
        stack: name.to_string(),
      });
    }

    workspace.store.save(&StackState::new(&workspace.project, name))?;
    info!(project = %workspace.project, stack = %name, "created stack");
    Ok(Self {
      workspace: workspace.clone(),
      name: name.to_string(),
    })
  }

  /// Selects an existing stack.
  pub fn select(workspace: &Workspace, name: &str) -> Result<Self, StackError> {
    validate_name(name)?;
    if !workspace.store.exists(&workspace.project, name) {
      return Err(StackError::StackNotFound {
        project: workspace.project.clone(),
        stack: name.to_string(),
      });
    }
    Ok(Self {
      workspace: workspace.clone(),
      name: name.to_string(),
    })
  }

  pub fn select_or_create(workspace: &Workspace, name: &str) -> Result<Self, StackError> {
    match Self::select(workspace, name) {
      Err(StackError::StackNotFound { .. }) => Self::create(workspace, name),
      other => other,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn workspace(&self) -> &Workspace {
    &self.workspace
  }

  /// Path of this stack's config file.
  pub fn config_path(&self) -> PathBuf {
    config_path(&self.workspace.project_dir, &self.name)
  }

  /// The stack's configuration; empty if it has no config file yet.
  pub fn config(&self) -> Result<StackConfig, StackError> {
    Ok(StackConfig::load_or_default(&self.config_path())?)
  }

  pub fn set_config(&self, key: &str, value: &str, secret: bool) -> Result<(), StackError> {
    let path = self.config_path();
    let mut config = StackConfig::load_or_default(&path)?;
    config.set(key, value, secret);
    config.save(&path)?;
    Ok(())
  }

  /// The stack's last saved state.
  pub fn state(&self) -> Result<StackState, StackError> {
    let state = self.workspace.store.load(&self.workspace.project, &self.name)?;
    Ok(state.unwrap_or_else(|| StackState::new(&self.workspace.project, &self.name)))
  }

  /// Exports of the last `up`.
  pub fn outputs(&self) -> Result<BTreeMap<String, ExportValue>, StackError> {
    Ok(self.state()?.outputs)
  }

  /// The recorded state of one resource, by logical name.
  pub fn resource(&self, name: &str) -> Result<Option<ResourceRecord>, StackError> {
    Ok(self.state()?.resources.remove(&ResourceName::from(name)))
  }

  /// Key of this stack's recorded input hashes, generated on first use.
  ///
  /// It is kept in the stack's config file, away from the state file that
  /// holds the hashes.
  fn input_salt(&self) -> Result<Secret, StackError> {
    let path = self.config_path();
    let mut config = StackConfig::load_or_default(&path)?;
    if let Some(salt) = config.get(INPUT_SALT_KEY) {
      return Ok(Secret::new(salt));
    }

    let salt = Secret::generate();
    config.set(INPUT_SALT_KEY, salt.expose(), true);
    config.save(&path)?;
    debug!(stack = %self.name, path = %path.display(), "generated input salt");
    Ok(salt)
  }

  fn evaluate<P: Program>(&self, program: P) -> Result<Context, StackError> {
    let config = self.config()?;
    let mut ctx = Context::new(&self.workspace.project, &self.name);
    program.declare(&mut ctx, &config)?;
    Ok(ctx)
  }

  /// Evaluates the program and plans the run without calling a backend.
  pub fn preview<P: Program>(&self, program: P) -> Result<Preview, StackError> {
    let prior = self.state()?;
    let ctx = self.evaluate(program)?;
    Ok(engine::preview(&ctx, Some(&prior))?)
  }

  /// Evaluates the program, provisions it, and saves the new state.
  ///
  /// State is saved even when resources fail: failed and skipped resources
  /// keep their previous records, and exports that did not resolve keep
  /// their previous values. The aggregate failure is returned after the
  /// save.
  ///
  /// Input hashes are always keyed with the stack's own salt, whatever
  /// `config.input_salt` holds.
  pub async fn up<P: Program>(
    &self,
    program: P,
    provider: Arc<dyn Provider>,
    config: &EngineConfig,
  ) -> Result<UpResult, StackError> {
    let prior = self.state()?;
    let config = EngineConfig {
      input_salt: self.input_salt()?,
      ..config.clone()
    };
    let ctx = self.evaluate(program)?;
    let result = engine::up(ctx, provider, Some(&prior), &config).await?;

    let mut next = StackState::new(&self.workspace.project, &self.name);
    next.resources = result.resources.clone();
    let unfinished = result.failed.iter().map(|(name, _)| name).chain(result.skipped.keys());
    for name in unfinished {
      if let Some(record) = prior.resource(name) {
        next.resources.insert(name.clone(), record.clone());
      }
    }
    for name in &result.removed {
      warn!(resource = %name, "resource is no longer declared; dropping it from state");
    }
    next.outputs = result.exports.clone();
    for (name, _) in &result.export_errors {
      if let Some(previous) = prior.outputs.get(name) {
        next.outputs.insert(name.clone(), previous.clone());
      }
    }
    next.touch();
    self.workspace.store.save(&next)?;

    info!(
      stack = %self.name,
      resources = next.resources.len(),
      exports = next.outputs.len(),
      "saved stack state"
    );

    match result.provision_error() {
      Some(e) => Err(e.into()),
      None => Ok(result),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tempfile::TempDir;

  use super::*;
  use crate::engine::Operation;
  use crate::output::Input;
  use crate::provider::{ProviderError, SimulatedProvider};
  use crate::resources::{ResourceGroup, ResourceGroupArgs, SkuName, StorageAccount, StorageAccountArgs, StorageKind};

  fn workspace(temp: &TempDir) -> Workspace {
    Workspace::new("demo", temp.path(), StateStore::new(temp.path().join("stacks")))
  }

  fn program(ctx: &mut Context, config: &StackConfig) -> Result<(), ProgramError> {
    let location = config.require("location")?;
    let group = ResourceGroup::new(
      ctx,
      "rg",
      ResourceGroupArgs {
        location: Some(location.into()),
        ..Default::default()
      },
    );
    let account = StorageAccount::new(
      ctx,
      "storage",
      StorageAccountArgs {
        resource_group_name: Input::from(&group.name),
        kind: StorageKind::StorageV2,
        sku: SkuName::StandardLrs,
        account_name: None,
        location: None,
      },
    );
    ctx.export::<String>("endpoint", &account.primary_blob_endpoint);
    Ok(())
  }

  #[test]
  fn create_select_lifecycle() {
    let temp = TempDir::new().unwrap();
    let ws = workspace(&temp);

    assert!(matches!(Stack::select(&ws, "dev"), Err(StackError::StackNotFound { .. })));
    let stack = Stack::create(&ws, "dev").unwrap();
    assert_eq!(stack.name(), "dev");
    assert!(matches!(Stack::create(&ws, "dev"), Err(StackError::StackExists { .. })));
    assert!(Stack::select(&ws, "dev").is_ok());
    assert!(Stack::select_or_create(&ws, "prod").is_ok());
    assert_eq!(ws.stacks().unwrap(), vec!["dev".to_string(), "prod".to_string()]);
  }

  #[test]
  fn invalid_names_are_rejected() {
    let temp = TempDir::new().unwrap();
    let ws = workspace(&temp);
    for name in ["", "../up", "a b", ".hidden"] {
      assert!(matches!(Stack::create(&ws, name), Err(StackError::InvalidName(_))), "{name}");
    }
  }

  #[test]
  fn config_round_trips_through_the_project_dir() {
    let temp = TempDir::new().unwrap();
    let stack = Stack::create(&workspace(&temp), "dev").unwrap();

    stack.set_config("location", "uksouth", false).unwrap();
    stack.set_config("sqlPassword", "correct-horse", true).unwrap();

    assert!(temp.path().join("Appstack.dev.yaml").is_file());
    let config = stack.config().unwrap();
    assert_eq!(config.get("location"), Some("uksouth"));
    assert!(config.is_secret("sqlPassword"));
  }

  #[test]
  fn missing_config_fails_before_provisioning() {
    let temp = TempDir::new().unwrap();
    let stack = Stack::create(&workspace(&temp), "dev").unwrap();
    let err = stack.preview(program).unwrap_err();
    assert!(matches!(err, StackError::Program(ProgramError::Config(ConfigError::Missing { .. }))));
  }

  #[tokio::test]
  async fn up_saves_state_and_outputs() {
    let temp = TempDir::new().unwrap();
    let stack = Stack::create(&workspace(&temp), "dev").unwrap();
    stack.set_config("location", "uksouth", false).unwrap();

    let provider = Arc::new(SimulatedProvider::new("westeurope"));
    let result = stack.up(program, provider.clone(), &EngineConfig::default()).await.unwrap();
    assert_eq!(result.count(Operation::Create), 2);

    let outputs = stack.outputs().unwrap();
    assert_eq!(outputs["endpoint"].value, json!("https://storage.blob.core.windows.net/"));
    let group = stack.resource("rg").unwrap().unwrap();
    assert_eq!(group.outputs["location"], json!("uksouth"));
    assert!(stack.resource("nope").unwrap().is_none());

    let preview = stack.preview(program).unwrap();
    assert_eq!(preview.count(engine::PlannedOperation::Existing), 2);
  }

  #[tokio::test]
  async fn input_salt_lives_in_the_config_file() {
    let temp = TempDir::new().unwrap();
    let stack = Stack::create(&workspace(&temp), "dev").unwrap();
    stack.set_config("location", "uksouth", false).unwrap();

    let provider = Arc::new(SimulatedProvider::new("uksouth"));
    stack.up(program, provider.clone(), &EngineConfig::default()).await.unwrap();

    let config = stack.config().unwrap();
    assert!(config.is_secret(INPUT_SALT_KEY));
    let salt = config.get(INPUT_SALT_KEY).unwrap().to_string();
    let state_file = temp.path().join("stacks").join("demo").join("dev.json");
    assert!(!std::fs::read_to_string(state_file).unwrap().contains(&salt));

    // A caller's salt is ignored in favour of the stack's own.
    let second = stack.up(program, provider, &EngineConfig::default()).await.unwrap();
    assert_eq!(second.count(Operation::Same), 2);
    assert_eq!(stack.config().unwrap().get(INPUT_SALT_KEY), Some(salt.as_str()));
  }

  #[tokio::test]
  async fn failure_is_returned_after_saving() {
    let temp = TempDir::new().unwrap();
    let stack = Stack::create(&workspace(&temp), "dev").unwrap();
    stack.set_config("location", "uksouth", false).unwrap();

    let provider = Arc::new(
      SimulatedProvider::new("uksouth").with_failure("storage", ProviderError::QuotaExceeded("storage".to_string())),
    );
    let err = stack.up(program, provider, &EngineConfig::default()).await.unwrap_err();

    match err {
      StackError::Provision(e) => assert_eq!(e.failed_resources(), vec![&ResourceName::from("storage")]),
      other => panic!("expected a provisioning error, got {other:?}"),
    }
    assert!(stack.resource("rg").unwrap().is_some());
    assert!(stack.resource("storage").unwrap().is_none());
  }
}
