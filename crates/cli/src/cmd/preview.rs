//! Implementation of the `appstack preview` command.

use std::path::Path;

use anyhow::{Context as _, Result};
use owo_colors::{OwoColorize, Stream};

use appstack_lib::appservice;
use appstack_lib::config::StackConfig;
use appstack_lib::engine::PlannedOperation;
use appstack_lib::graph::Context;
use appstack_lib::package::FileArchive;
use appstack_lib::stack::Stack;

use crate::output::{format_size, print_info, print_stat, short_digest, symbols};

pub fn cmd_preview(project_dir: &Path, stack_name: &str, package_dir: &Path) -> Result<()> {
  let stack = Stack::select(&super::workspace(project_dir), stack_name).context("Failed to select stack")?;
  let package_dir = super::package_path(project_dir, package_dir);
  let archive = FileArchive::from_dir(&package_dir).context("Failed to package application")?;

  let preview = stack
    .preview(|ctx: &mut Context, config: &StackConfig| appservice::declare(ctx, config, &archive).map(|_| ()))
    .context("Preview failed")?;

  print_info(&format!("Previewing stack '{}'", stack.name()));
  print_stat(
    "Package",
    &format!(
      "{} ({} files, {}, {})",
      archive.path().display(),
      archive.file_count(),
      format_size(archive.size()),
      short_digest(archive.sha256())
    ),
  );
  println!();

  for (index, wave) in preview.waves.iter().enumerate() {
    println!(
      "{}",
      format!("Wave {}", index + 1).if_supports_color(Stream::Stdout, |s| s.bold())
    );
    for step in wave {
      let symbol = match step.operation {
        PlannedOperation::Create => symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
        PlannedOperation::Existing => symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
        PlannedOperation::Invoke => symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.cyan()).to_string(),
      };
      println!(
        "  {symbol} {} {}",
        step.name,
        format!("({}, {})", step.kind, step.operation).if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    }
  }

  for name in &preview.removed {
    println!(
      "  {} {} {}",
      symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
      name,
      "(no longer declared)".if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  println!();
  print_stat("To create", &preview.count(PlannedOperation::Create).to_string());
  print_stat("Existing", &preview.count(PlannedOperation::Existing).to_string());
  print_stat("Invokes", &preview.count(PlannedOperation::Invoke).to_string());
  if !preview.removed.is_empty() {
    print_stat("To drop from state", &preview.removed.len().to_string());
  }

  Ok(())
}
