//! CLI output formatting utilities.
//!
//! Colored status lines go to stdout (errors and warnings to stderr) so that
//! `outputs --json` stays parseable.

use std::time::Duration;

use anyhow::Context;
use appstack_lib::util::hash::ContentHash;
use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const ADD: &str = "+";
  pub const MODIFY: &str = "~";
  pub const REMOVE: &str = "-";
}

/// The leading twelve hex digits of a digest, enough to tell packages apart.
pub fn short_digest(hash: &ContentHash) -> &str {
  hash.0.get(..12).unwrap_or(&hash.0)
}

/// Archive sizes in binary units, one decimal above a kibibyte.
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut scaled = bytes as f64 / 1024.0;
  let mut unit = 0;
  while scaled >= 1024.0 && unit + 1 < UNITS.len() {
    scaled /= 1024.0;
    unit += 1;
  }
  format!("{scaled:.1} {}", UNITS[unit])
}

/// Wall-clock time of an `up`; deployments rarely finish under a second.
pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs_f64();
  match elapsed.as_secs() {
    0 => format!("{}ms", elapsed.as_millis()),
    1..60 => format!("{secs:.1}s"),
    whole => format!("{}m{:02}s", whole / 60, whole % 60),
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
