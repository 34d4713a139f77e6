//! Types for deployment runs.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::graph::GraphError;
use crate::output::OutputError;
use crate::provider::ProviderError;
use crate::resource::{ResourceKind, ResourceName};
use crate::secret::Secret;
use crate::state::{ExportValue, ResourceRecord};

/// Errors that stop a run before any resource is submitted.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("invalid resource graph: {0}")]
  Validation(#[from] GraphError),
}

/// Why a single resource failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
  /// An input could not be resolved.
  #[error("input '{property}' did not resolve: {source}")]
  Input {
    property: String,
    #[source]
    source: OutputError,
  },

  #[error("failed to hash inputs: {0}")]
  Hash(String),

  #[error(transparent)]
  Provider(#[from] ProviderError),

  /// The provisioning task ended without reporting a result.
  #[error("provisioning task aborted")]
  Aborted,
}

/// What the engine did with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Create,
  Update,
  /// Inputs unchanged since the last run; the backend was not called.
  Same,
  Invoke,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Operation::Create => "create",
      Operation::Update => "update",
      Operation::Same => "same",
      Operation::Invoke => "invoke",
    };
    f.write_str(label)
  }
}

/// Aggregate failure of a run, naming every failing resource.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", describe_failures(.failures, .skipped))]
pub struct ProvisionError {
  pub failures: Vec<(ResourceName, NodeError)>,
  /// Skipped resource -> the failed dependency.
  pub skipped: BTreeMap<ResourceName, ResourceName>,
}

impl ProvisionError {
  /// Names of the resources that failed, in the order they failed.
  pub fn failed_resources(&self) -> Vec<&ResourceName> {
    self.failures.iter().map(|(name, _)| name).collect()
  }
}

fn describe_failures(failures: &[(ResourceName, NodeError)], skipped: &BTreeMap<ResourceName, ResourceName>) -> String {
  let mut message = format!("{} resource(s) failed to provision", failures.len());
  for (name, error) in failures {
    message.push_str(&format!("\n  {name}: {error}"));
  }
  if !skipped.is_empty() {
    let names: Vec<String> = skipped.keys().map(ToString::to_string).collect();
    message.push_str(&format!("\n  skipped: {}", names.join(", ")));
  }
  message
}

/// Result of a run.
#[derive(Debug, Default)]
pub struct UpResult {
  /// Records of every provisioned (or unchanged) resource. Invokes are not recorded.
  pub resources: BTreeMap<ResourceName, ResourceRecord>,

  /// Operation performed per resource, invokes included.
  pub operations: BTreeMap<ResourceName, Operation>,

  /// Resources that failed, in the order they failed.
  pub failed: Vec<(ResourceName, NodeError)>,

  /// Resources skipped because a dependency failed.
  /// Maps skipped resource -> the failed dependency.
  pub skipped: BTreeMap<ResourceName, ResourceName>,

  /// Resolved exports.
  pub exports: BTreeMap<String, ExportValue>,

  /// Exports that did not resolve.
  pub export_errors: Vec<(String, OutputError)>,

  /// Resources recorded by the previous run that are no longer declared.
  pub removed: Vec<ResourceName>,
}

impl UpResult {
  /// Returns true if every resource provisioned.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  /// Number of resources with the given operation.
  pub fn count(&self, operation: Operation) -> usize {
    self.operations.values().filter(|op| **op == operation).count()
  }

  /// The aggregate error for failed runs.
  pub fn provision_error(&self) -> Option<ProvisionError> {
    if self.is_success() {
      return None;
    }
    Some(ProvisionError {
      failures: self.failed.clone(),
      skipped: self.skipped.clone(),
    })
  }
}

/// Planned operation for a resource, computed without calling the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedOperation {
  Create,
  /// Recorded by the previous run; updated only if its inputs changed.
  Existing,
  Invoke,
}

impl fmt::Display for PlannedOperation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      PlannedOperation::Create => "create",
      PlannedOperation::Existing => "existing",
      PlannedOperation::Invoke => "invoke",
    };
    f.write_str(label)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
  pub name: ResourceName,
  pub kind: ResourceKind,
  pub operation: PlannedOperation,
}

/// Result of a preview.
#[derive(Debug, Clone, Default)]
pub struct Preview {
  pub waves: Vec<Vec<PlannedStep>>,
  pub removed: Vec<ResourceName>,
}

impl Preview {
  pub fn steps(&self) -> impl Iterator<Item = &PlannedStep> {
    self.waves.iter().flatten()
  }

  pub fn count(&self, operation: PlannedOperation) -> usize {
    self.steps().filter(|step| step.operation == operation).count()
  }
}

/// Configuration for deployment runs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Maximum number of concurrent backend calls.
  pub parallelism: usize,

  /// Key of the recorded input hashes. Runs compare hashes only when they
  /// share a salt; a stack keeps its own outside the state file.
  pub input_salt: Secret,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      input_salt: Secret::generate(),
    }
  }
}

fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
