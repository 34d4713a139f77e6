//! Implementation of the `appstack up` command.
//!
//! Packages the application, provisions the stack against the simulated
//! backend (seeded from the stack's saved state) and saves the new state.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result, bail};
use tracing::debug;

use appstack_lib::appservice::{self, LOCATION_KEY};
use appstack_lib::config::StackConfig;
use appstack_lib::consts::REDACTED;
use appstack_lib::engine::{EngineConfig, Operation};
use appstack_lib::graph::Context;
use appstack_lib::package::FileArchive;
use appstack_lib::provider::SimulatedProvider;
use appstack_lib::stack::{Stack, StackError};

use crate::output::{format_elapsed, format_size, print_error, print_stat, print_success, print_warning};

pub fn cmd_up(project_dir: &Path, stack_name: &str, package_dir: &Path, parallelism: Option<usize>) -> Result<()> {
  let stack = Stack::select(&super::workspace(project_dir), stack_name).context("Failed to select stack")?;
  let package_dir = super::package_path(project_dir, package_dir);
  let archive = FileArchive::from_dir(&package_dir).context("Failed to package application")?;

  let config = stack.config().context("Failed to load stack config")?;
  let location = config.get(LOCATION_KEY).unwrap_or_default().to_string();
  let state = stack.state().context("Failed to load stack state")?;
  let provider = Arc::new(SimulatedProvider::new(location).seeded(&state));

  let mut engine_config = EngineConfig::default();
  if let Some(parallelism) = parallelism {
    engine_config.parallelism = parallelism;
  }

  debug!(parallelism = engine_config.parallelism, stack = %stack.name(), "starting up");
  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(stack.up(
    |ctx: &mut Context, config: &StackConfig| appservice::declare(ctx, config, &archive).map(|_| ()),
    provider,
    &engine_config,
  ));

  let result = match outcome {
    Ok(result) => result,
    Err(StackError::Provision(e)) => {
      for (name, error) in &e.failures {
        print_error(&format!("{name}: {error}"));
      }
      for (name, dependency) in &e.skipped {
        print_warning(&format!("{name}: skipped because {dependency} failed"));
      }
      bail!("Up failed: {} resource(s) failed, {} skipped", e.failures.len(), e.skipped.len());
    }
    Err(e) => return Err(e).context("Up failed"),
  };

  println!();
  print_success(&format!("Up complete for stack '{}'", stack.name()));
  print_stat("Created", &result.count(Operation::Create).to_string());
  print_stat("Updated", &result.count(Operation::Update).to_string());
  print_stat("Unchanged", &result.count(Operation::Same).to_string());
  print_stat("Invoked", &result.count(Operation::Invoke).to_string());
  if !result.removed.is_empty() {
    print_stat("Dropped from state", &result.removed.len().to_string());
  }
  print_stat("Package", &format_size(archive.size()));
  print_stat("Duration", &format_elapsed(started.elapsed()));

  if !result.exports.is_empty() {
    println!();
    println!("Outputs:");
    for (name, export) in &result.exports {
      let value = if export.secret {
        REDACTED.to_string()
      } else {
        super::outputs::display_value(&export.value)
      };
      print_stat(name, &value);
    }
  }

  Ok(())
}
