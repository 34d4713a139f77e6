//! Implementation of the `appstack init` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use appstack_lib::appservice::{LOCATION_KEY, SQL_PASSWORD_KEY};
use appstack_lib::stack::Stack;

use crate::output::symbols;

/// Creates the stack and, if a location is given, its config file.
///
/// # Errors
///
/// Returns an error if the stack already exists.
pub fn cmd_init(project_dir: &Path, stack_name: &str, location: Option<&str>) -> Result<()> {
  let ws = super::workspace(project_dir);
  let stack = Stack::create(&ws, stack_name).context("Failed to create stack")?;

  if let Some(location) = location {
    stack
      .set_config(LOCATION_KEY, location, false)
      .context("Failed to write stack config")?;
  }

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    format!("Created stack '{}'", stack.name()).green().bold()
  );
  println!();
  println!("  {} Project: {}", symbols::INFO.cyan(), ws.project());
  println!("  {} Config:  {}", symbols::INFO.cyan(), stack.config_path().display());
  println!();
  println!("{}", "Next steps:".bold());
  let mut step = 1;
  if location.is_none() {
    println!(
      "  {step}. Run: {}",
      format!("appstack --stack {stack_name} config set {LOCATION_KEY} uksouth").cyan()
    );
    step += 1;
  }
  println!(
    "  {step}. Run: {}",
    format!("appstack --stack {stack_name} config set {SQL_PASSWORD_KEY} <password> --secret").cyan()
  );
  println!(
    "  {}. Run: {}",
    step + 1,
    format!("appstack --stack {stack_name} up").cyan()
  );

  Ok(())
}
