mod config;
mod init;
mod outputs;
mod preview;
mod up;

pub use config::{cmd_config_get, cmd_config_set};
pub use init::cmd_init;
pub use outputs::cmd_outputs;
pub use preview::cmd_preview;
pub use up::cmd_up;

use std::path::{Path, PathBuf};

use appstack_lib::appservice::PROJECT;
use appstack_lib::stack::Workspace;
use appstack_lib::state::StateStore;

/// The workspace of the App Service project rooted at `project_dir`.
fn workspace(project_dir: &Path) -> Workspace {
  Workspace::new(PROJECT, project_dir, StateStore::default_store())
}

/// Resolves a package directory against the project directory.
fn package_path(project_dir: &Path, package_dir: &Path) -> PathBuf {
  if package_dir.is_absolute() {
    package_dir.to_path_buf()
  } else {
    project_dir.join(package_dir)
  }
}
