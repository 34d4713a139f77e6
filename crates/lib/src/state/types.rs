use std::collections::BTreeMap;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resource::{ResourceKind, ResourceName};
use crate::util::hash::ContentHash;

/// Current state document format.
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read state: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write state: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse state: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported state version {0}")]
  UnsupportedVersion(u32),
}

/// A provisioned resource as recorded after an `up`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
  pub kind: ResourceKind,
  pub id: String,
  /// Resolved inputs with secret values redacted.
  pub inputs: Map<String, Value>,
  /// Hash of the unredacted inputs.
  pub inputs_hash: ContentHash,
  pub outputs: Map<String, Value>,
}

/// A resolved export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportValue {
  pub value: Value,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub secret: bool,
}

/// The persisted state of one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackState {
  pub version: u32,
  pub project: String,
  pub stack: String,
  /// Seconds since the Unix epoch of the last write.
  pub updated_at: u64,
  #[serde(default)]
  pub resources: BTreeMap<ResourceName, ResourceRecord>,
  #[serde(default)]
  pub outputs: BTreeMap<String, ExportValue>,
}

impl StackState {
  /// An empty state for a freshly created stack.
  pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
    Self {
      version: STATE_VERSION,
      project: project.into(),
      stack: stack.into(),
      updated_at: now(),
      resources: BTreeMap::new(),
      outputs: BTreeMap::new(),
    }
  }

  pub fn resource(&self, name: &ResourceName) -> Option<&ResourceRecord> {
    self.resources.get(name)
  }

  /// Marks the state as written now.
  pub fn touch(&mut self) {
    self.updated_at = now();
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }
}

fn now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}
