//! Resource graph construction.
//!
//! A program declares resources against a [`Context`]. Each registration
//! records a [`Declaration`] and hands back the node's output slot, so later
//! declarations can consume its outputs as deferred inputs. Nothing is
//! provisioned here; the engine validates the collected declarations with
//! [`ResourceDag`] and drives them against a provider.

mod dag;

pub use dag::{GraphError, ResourceDag};

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::output::{Input, Output, OutputError};
use crate::resource::{Declaration, Properties, ResourceKind, ResourceName, ResourceOptions, ResourceState};

/// A named value surfaced to the operator after provisioning.
#[derive(Debug, Clone)]
pub struct Export {
  pub name: String,
  pub value: Output<Value>,
}

/// Collects the declarations and exports of one program evaluation.
#[derive(Debug)]
pub struct Context {
  project: String,
  stack: String,
  declarations: Vec<Declaration>,
  exports: Vec<Export>,
}

impl Context {
  pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
    Self {
      project: project.into(),
      stack: stack.into(),
      declarations: Vec::new(),
      exports: Vec::new(),
    }
  }

  pub fn project(&self) -> &str {
    &self.project
  }

  pub fn stack(&self) -> &str {
    &self.stack
  }

  /// Records a resource declaration and returns its output slot.
  ///
  /// Name uniqueness and dependency existence are checked when the graph is
  /// built, not here.
  pub fn register(
    &mut self,
    kind: ResourceKind,
    name: impl Into<ResourceName>,
    properties: Properties,
    options: ResourceOptions,
  ) -> Output<ResourceState> {
    let name = name.into();
    let state = Output::pending(BTreeSet::from([name.clone()]), false);

    debug!(
      resource = %name,
      kind = %kind,
      inputs = properties.len(),
      depends_on = options.depends_on.len(),
      "registered resource"
    );

    self.declarations.push(Declaration {
      name,
      kind,
      properties,
      options,
      state: state.clone(),
    });
    state
  }

  /// Records an export.
  pub fn export<T>(&mut self, name: impl Into<String>, value: impl Into<Input<T>>)
  where
    T: Serialize + Clone + Send + 'static,
  {
    let name = name.into();
    let value = value
      .into()
      .into_output()
      .try_map(|value| serde_json::to_value(value).map_err(|e| OutputError::Transform(e.to_string())));
    debug!(export = %name, "registered export");
    self.exports.push(Export { name, value });
  }

  pub fn declarations(&self) -> &[Declaration] {
    &self.declarations
  }

  pub fn exports(&self) -> &[Export] {
    &self.exports
  }

  pub fn into_parts(self) -> (Vec<Declaration>, Vec<Export>) {
    (self.declarations, self.exports)
  }
}
