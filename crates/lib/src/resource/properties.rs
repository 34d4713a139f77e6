use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::output::{Input, Output, OutputError};

use super::ResourceName;

/// Input properties of a declaration, keyed by wire name.
#[derive(Debug, Clone, Default)]
pub struct Properties {
  entries: BTreeMap<String, Output<Value>>,
}

impl Properties {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets a property from a literal or deferred input.
  pub fn set<T>(mut self, key: &str, input: Input<T>) -> Self
  where
    T: Serialize + Clone + Send + 'static,
  {
    let value = input
      .into_output()
      .try_map(|value| serde_json::to_value(value).map_err(|e| OutputError::Transform(e.to_string())));
    self.entries.insert(key.to_string(), value);
    self
  }

  /// Sets a property only if an input is given.
  pub fn set_opt<T>(self, key: &str, input: Option<Input<T>>) -> Self
  where
    T: Serialize + Clone + Send + 'static,
  {
    match input {
      Some(input) => self.set(key, input),
      None => self,
    }
  }

  /// Sets a property that is already a JSON output.
  pub fn set_output(mut self, key: &str, value: Output<Value>) -> Self {
    self.entries.insert(key.to_string(), value);
    self
  }

  /// Resources referenced by any property.
  pub fn dependencies(&self) -> BTreeSet<ResourceName> {
    self
      .entries
      .values()
      .flat_map(|value| value.dependencies().iter().cloned())
      .collect()
  }

  pub fn get(&self, key: &str) -> Option<&Output<Value>> {
    self.entries.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Output<Value>)> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn literals_serialize_immediately() {
    let properties = Properties::new()
      .set("kind", Input::from("StorageV2"))
      .set("sku", Input::Value(json!({ "name": "Standard_LRS" })));

    assert_eq!(properties.len(), 2);
    assert_eq!(properties.get("kind").unwrap().peek(), Some(Ok(json!("StorageV2"))));
    assert!(properties.dependencies().is_empty());
  }

  #[test]
  fn deferred_inputs_contribute_dependencies() {
    let group: Output<String> = Output::pending(BTreeSet::from([ResourceName::from("appservicerg")]), false);
    let properties = Properties::new()
      .set("resourceGroupName", Input::from(&group))
      .set_opt::<String>("location", None);

    assert_eq!(properties.len(), 1);
    assert_eq!(
      properties.dependencies(),
      BTreeSet::from([ResourceName::from("appservicerg")])
    );

    group.settle(Ok("appservicerg".to_string()));
    assert_eq!(
      properties.get("resourceGroupName").unwrap().peek(),
      Some(Ok(json!("appservicerg")))
    );
  }
}
