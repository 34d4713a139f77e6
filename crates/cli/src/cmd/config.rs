//! Implementation of the `appstack config` commands.

use std::path::Path;

use anyhow::{Context, Result, bail};

use appstack_lib::consts::REDACTED;
use appstack_lib::stack::Stack;

use crate::output::print_success;

pub fn cmd_config_set(project_dir: &Path, stack_name: &str, key: &str, value: &str, secret: bool) -> Result<()> {
  let stack = Stack::select(&super::workspace(project_dir), stack_name).context("Failed to select stack")?;
  stack
    .set_config(key, value, secret)
    .with_context(|| format!("Failed to set '{key}'"))?;

  let kind = if secret { "secret" } else { "value" };
  print_success(&format!("Set {kind} '{key}' on stack '{stack_name}'"));
  Ok(())
}

pub fn cmd_config_get(project_dir: &Path, stack_name: &str, key: &str, show_secrets: bool) -> Result<()> {
  let stack = Stack::select(&super::workspace(project_dir), stack_name).context("Failed to select stack")?;
  let config = stack.config().context("Failed to load stack config")?;

  let Some(value) = config.get(key) else {
    bail!("'{key}' is not set on stack '{stack_name}'");
  };
  if config.is_secret(key) && !show_secrets {
    println!("{REDACTED}");
  } else {
    println!("{value}");
  }
  Ok(())
}
