//! Resource declarations.
//!
//! A [`Declaration`] is one node of the resource graph: a unique logical
//! name, a [`ResourceKind`], a set of input [`Properties`] (literal or
//! deferred) and a single output slot holding the [`ResourceState`] the
//! backend reports once the node is provisioned.

mod properties;

pub use properties::Properties;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::output::{Output, OutputError};

/// The logical name of a resource, unique within a program.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(pub String);

impl fmt::Display for ResourceName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for ResourceName {
  fn from(name: &str) -> Self {
    Self(name.to_string())
  }
}

impl From<String> for ResourceName {
  fn from(name: String) -> Self {
    Self(name)
  }
}

/// The type of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
  ResourceGroup,
  StorageAccount,
  BlobContainer,
  Blob,
  /// Service SAS token request. An invoke, not a stateful resource.
  ServiceSas,
  AppInsights,
  SqlServer,
  SqlDatabase,
  AppServicePlan,
  WebApp,
}

impl ResourceKind {
  /// The provider type token, e.g. `azure-native:storage:StorageAccount`.
  pub fn type_token(self) -> &'static str {
    match self {
      ResourceKind::ResourceGroup => "azure-native:resources:ResourceGroup",
      ResourceKind::StorageAccount => "azure-native:storage:StorageAccount",
      ResourceKind::BlobContainer => "azure-native:storage:BlobContainer",
      ResourceKind::Blob => "azure-native:storage:Blob",
      ResourceKind::ServiceSas => "azure-native:storage:listStorageAccountServiceSAS",
      ResourceKind::AppInsights => "azure-native:insights:Component",
      ResourceKind::SqlServer => "azure-native:sql:Server",
      ResourceKind::SqlDatabase => "azure-native:sql:Database",
      ResourceKind::AppServicePlan => "azure-native:web:AppServicePlan",
      ResourceKind::WebApp => "azure-native:web:WebApp",
    }
  }

  /// Invokes are re-evaluated on every run and never stored in stack state.
  pub fn is_invoke(self) -> bool {
    matches!(self, ResourceKind::ServiceSas)
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_token())
  }
}

/// State of a provisioned resource, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
  /// Logical name of the declaration.
  pub name: ResourceName,
  pub kind: ResourceKind,
  /// Backend identifier. Empty for invokes.
  pub id: String,
  /// Output properties, keyed by wire name.
  pub outputs: Map<String, Value>,
}

impl ResourceState {
  /// Looks up an output property.
  pub fn output(&self, property: &str) -> Result<&Value, OutputError> {
    self.outputs.get(property).ok_or_else(|| OutputError::MissingProperty {
      resource: self.name.clone(),
      property: property.to_string(),
    })
  }

  /// Looks up a string output property.
  pub fn output_str(&self, property: &str) -> Result<String, OutputError> {
    self
      .output(property)?
      .as_str()
      .map(str::to_string)
      .ok_or_else(|| OutputError::UnexpectedType {
        resource: self.name.clone(),
        property: property.to_string(),
        expected: "string",
      })
  }
}

impl Output<ResourceState> {
  /// Projects an output property of a resource.
  pub fn property(&self, property: &'static str) -> Output<Value> {
    self.try_map(move |state| state.output(property).cloned())
  }

  /// Projects a string output property of a resource.
  pub fn property_str(&self, property: &'static str) -> Output<String> {
    self.try_map(move |state| state.output_str(property))
  }

  /// The backend identifier of a resource.
  pub fn id(&self) -> Output<String> {
    self.map(|state| state.id)
  }
}

/// Options that are not inputs of the resource itself.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
  /// Explicit dependencies, in addition to those implied by inputs.
  pub depends_on: Vec<ResourceName>,
}

/// One node of the resource graph.
#[derive(Debug, Clone)]
pub struct Declaration {
  pub name: ResourceName,
  pub kind: ResourceKind,
  pub properties: Properties,
  pub options: ResourceOptions,
  /// Output slot, settled exactly once by the engine.
  pub state: Output<ResourceState>,
}

impl Declaration {
  /// Every resource this declaration depends on: the sources of its inputs
  /// plus explicit `depends_on` entries.
  pub fn dependencies(&self) -> BTreeSet<ResourceName> {
    let mut dependencies = self.properties.dependencies();
    dependencies.extend(self.options.depends_on.iter().cloned());
    dependencies
  }
}
