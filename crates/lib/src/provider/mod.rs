//! Provisioning backends.
//!
//! A [`Provider`] is the control plane the engine submits declarations to.
//! Calls are asynchronous and may be slow; the engine never retries them.
//!
//! - [`SimulatedProvider`]: in-memory control plane with the validation and
//!   output shapes of the real one, used by the CLI and the tests.

mod simulated;

pub use simulated::{SimulatedProvider, Submission, SubmissionKind};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resource::{ResourceKind, ResourceName};

/// Errors reported by a provisioning backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
  #[error("invalid value for '{property}': {message}")]
  InvalidArgument { property: String, message: String },

  #[error("required property '{0}' is missing")]
  MissingProperty(String),

  #[error("name '{name}' is already taken by {existing}")]
  Conflict { name: String, existing: String },

  #[error("resource not found: {0}")]
  NotFound(String),

  #[error("quota exceeded: {0}")]
  QuotaExceeded(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("{operation} is not supported for {kind}")]
  Unsupported { kind: ResourceKind, operation: &'static str },
}

/// A fully resolved submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
  pub name: ResourceName,
  pub kind: ResourceKind,
  /// Resolved inputs, keyed by wire name. May contain secret plaintext.
  pub inputs: Map<String, Value>,
}

impl ResourceRequest {
  /// A required string input.
  pub fn require_str(&self, property: &str) -> Result<&str, ProviderError> {
    match self.inputs.get(property) {
      None | Some(Value::Null) => Err(ProviderError::MissingProperty(property.to_string())),
      Some(Value::String(value)) => Ok(value),
      Some(_) => Err(ProviderError::InvalidArgument {
        property: property.to_string(),
        message: "expected a string".to_string(),
      }),
    }
  }

  /// An optional string input.
  pub fn get_str(&self, property: &str) -> Option<&str> {
    self.inputs.get(property).and_then(Value::as_str)
  }
}

/// What the backend reports for a provisioned resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedResource {
  pub id: String,
  pub outputs: Map<String, Value>,
}

/// A provisioning backend.
#[async_trait]
pub trait Provider: Send + Sync {
  /// Creates a resource.
  async fn create(&self, request: &ResourceRequest) -> Result<ProvisionedResource, ProviderError>;

  /// Updates an existing resource in place.
  async fn update(&self, id: &str, request: &ResourceRequest) -> Result<ProvisionedResource, ProviderError>;

  /// Reads the current state of a resource.
  async fn read(&self, kind: ResourceKind, id: &str) -> Result<ProvisionedResource, ProviderError>;

  /// Runs a stateless function such as a SAS token request.
  async fn invoke(&self, request: &ResourceRequest) -> Result<Map<String, Value>, ProviderError>;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn request(inputs: Value) -> ResourceRequest {
    ResourceRequest {
      name: ResourceName::from("appservicesa"),
      kind: ResourceKind::StorageAccount,
      inputs: inputs.as_object().cloned().unwrap_or_default(),
    }
  }

  #[test]
  fn require_str_distinguishes_missing_and_mistyped() {
    let request = request(json!({ "accountName": "appservicesa", "sku": { "name": "Standard_LRS" }, "kind": null }));

    assert_eq!(request.require_str("accountName").unwrap(), "appservicesa");
    assert_eq!(
      request.require_str("kind"),
      Err(ProviderError::MissingProperty("kind".to_string()))
    );
    assert!(matches!(
      request.require_str("sku"),
      Err(ProviderError::InvalidArgument { .. })
    ));
    assert_eq!(request.get_str("location"), None);
  }
}
