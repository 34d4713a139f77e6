//! Implementation of the `appstack outputs` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use appstack_lib::consts::REDACTED;
use appstack_lib::stack::Stack;

use crate::output::{print_info, print_json, print_stat};

/// Renders an export value for display: strings without quotes, anything
/// else as JSON.
pub(super) fn display_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

pub fn cmd_outputs(project_dir: &Path, stack_name: &str, json: bool, show_secrets: bool) -> Result<()> {
  let stack = Stack::select(&super::workspace(project_dir), stack_name).context("Failed to select stack")?;
  let outputs = stack.outputs().context("Failed to load stack state")?;

  let shown = |secret: bool, value: &Value| {
    if secret && !show_secrets {
      Value::String(REDACTED.to_string())
    } else {
      value.clone()
    }
  };

  if json {
    let map: Map<String, Value> = outputs
      .iter()
      .map(|(name, export)| (name.clone(), shown(export.secret, &export.value)))
      .collect();
    return print_json(&map);
  }

  if outputs.is_empty() {
    print_info(&format!("Stack '{stack_name}' has no outputs. Run 'appstack up' first."));
    return Ok(());
  }

  for (name, export) in &outputs {
    print_stat(name, &display_value(&shown(export.secret, &export.value)));
  }
  Ok(())
}
