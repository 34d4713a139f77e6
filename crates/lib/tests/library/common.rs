//! Shared helpers for library integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use appstack_lib::appservice::{AppServiceProgram, LOCATION_KEY, PROJECT, SQL_PASSWORD_KEY};
use appstack_lib::engine::{EngineConfig, UpResult};
use appstack_lib::provider::SimulatedProvider;
use appstack_lib::stack::{Stack, StackError, Workspace};
use appstack_lib::state::StateStore;
use tempfile::TempDir;

pub const STACK: &str = "testing";
pub const PASSWORD: &str = "Harness-Pa55word!";

/// An isolated project directory with its own state store.
pub struct TestProject {
  pub temp: TempDir,
  pub workspace: Workspace,
}

impl TestProject {
  /// A project with a small `wwwroot` and a configured `testing` stack.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let workspace = Workspace::new(PROJECT, temp.path(), StateStore::new(temp.path().join("state")));
    let project = Self { temp, workspace };

    project.write_file("wwwroot/index.html", "<h1>Hello from App Service</h1>");
    project.write_file("wwwroot/css/site.css", "h1 { font-family: sans-serif; }");

    let stack = project.stack();
    stack.set_config(LOCATION_KEY, "uksouth", false).unwrap();
    stack.set_config(SQL_PASSWORD_KEY, PASSWORD, true).unwrap();
    project
  }

  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn package_dir(&self) -> PathBuf {
    self.temp.path().join("wwwroot")
  }

  pub fn state_file(&self) -> PathBuf {
    self.temp.path().join("state").join(PROJECT).join(format!("{STACK}.json"))
  }

  /// Selects the `testing` stack, creating it on first use.
  pub fn stack(&self) -> Stack {
    Stack::select_or_create(&self.workspace, STACK).unwrap()
  }

  /// Runs `up` against a backend seeded from the stack's saved state, the
  /// way a fresh process would.
  pub async fn up(&self) -> Result<UpResult, StackError> {
    let stack = self.stack();
    let provider = SimulatedProvider::new("westeurope").seeded(&stack.state().unwrap());
    self.up_with(Arc::new(provider)).await
  }

  pub async fn up_with(&self, provider: Arc<SimulatedProvider>) -> Result<UpResult, StackError> {
    self
      .stack()
      .up(AppServiceProgram::new(self.package_dir()), provider, &EngineConfig::default())
      .await
  }
}
