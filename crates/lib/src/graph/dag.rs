//! Dependency DAG over resource declarations.
//!
//! Edges run from a dependency to its dependent. Building the DAG validates
//! the declarations (unique names, declared dependencies, no cycles) before
//! anything is submitted to a provider.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::resource::{Declaration, ResourceName};

use super::Export;

/// Validation errors found while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("resource {0} is declared more than once")]
  DuplicateResource(ResourceName),

  #[error("export '{0}' is declared more than once")]
  DuplicateExport(String),

  #[error("resource {resource} depends on undeclared resource {dependency}")]
  UndeclaredDependency {
    resource: ResourceName,
    dependency: ResourceName,
  },

  #[error("export '{export}' depends on undeclared resource {dependency}")]
  UndeclaredExportDependency { export: String, dependency: ResourceName },

  /// Reported with one resource that lies on the cycle.
  #[error("dependency cycle detected at resource {0}")]
  CycleDetected(ResourceName),
}

/// A validated dependency graph.
#[derive(Debug)]
pub struct ResourceDag {
  graph: DiGraph<ResourceName, ()>,
  nodes: HashMap<ResourceName, NodeIndex>,
}

impl ResourceDag {
  /// Builds and validates the graph.
  ///
  /// Nodes are added in declaration order, so ties in [`Self::waves`] and
  /// [`Self::topological_order`] keep the order the program used.
  pub fn build(declarations: &[Declaration], exports: &[Export]) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for declaration in declarations {
      if nodes.contains_key(&declaration.name) {
        return Err(GraphError::DuplicateResource(declaration.name.clone()));
      }
      let idx = graph.add_node(declaration.name.clone());
      nodes.insert(declaration.name.clone(), idx);
    }

    for declaration in declarations {
      let dependent_idx = nodes[&declaration.name];
      for dependency in declaration.dependencies() {
        if dependency == declaration.name {
          return Err(GraphError::CycleDetected(dependency));
        }
        let Some(&dep_idx) = nodes.get(&dependency) else {
          return Err(GraphError::UndeclaredDependency {
            resource: declaration.name.clone(),
            dependency,
          });
        };
        graph.add_edge(dep_idx, dependent_idx, ());
      }
    }

    let mut export_names = HashSet::new();
    for export in exports {
      if !export_names.insert(export.name.as_str()) {
        return Err(GraphError::DuplicateExport(export.name.clone()));
      }
      if let Some(dependency) = export.value.dependencies().iter().find(|dep| !nodes.contains_key(*dep)) {
        return Err(GraphError::UndeclaredExportDependency {
          export: export.name.clone(),
          dependency: dependency.clone(),
        });
      }
    }

    let dag = Self { graph, nodes };
    dag.topological_order()?;
    Ok(dag)
  }

  /// Resource names such that every dependency precedes its dependents.
  pub fn topological_order(&self) -> Result<Vec<ResourceName>, GraphError> {
    let sorted = toposort(&self.graph, None).map_err(|cycle| GraphError::CycleDetected(self.graph[cycle.node_id()].clone()))?;
    Ok(sorted.into_iter().map(|idx| self.graph[idx].clone()).collect())
  }

  /// Groups resources into waves.
  ///
  /// Every dependency of a resource lies in an earlier wave, so the
  /// resources of one wave may be submitted concurrently. Within a wave,
  /// resources keep declaration order.
  pub fn waves(&self) -> Result<Vec<Vec<ResourceName>>, GraphError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: Vec<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let (ready, blocked): (Vec<NodeIndex>, Vec<NodeIndex>) =
        remaining.into_iter().partition(|idx| in_degree[idx] == 0);

      if ready.is_empty() {
        return Err(GraphError::CycleDetected(self.graph[blocked[0]].clone()));
      }

      for &idx in &ready {
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(degree) = in_degree.get_mut(&neighbor) {
            *degree = degree.saturating_sub(1);
          }
        }
      }

      waves.push(ready.into_iter().map(|idx| self.graph[idx].clone()).collect());
      remaining = blocked;
    }

    Ok(waves)
  }

  /// Direct dependencies of a resource, sorted by name.
  pub fn dependencies(&self, name: &ResourceName) -> Vec<ResourceName> {
    self.neighbors(name, Direction::Incoming)
  }

  /// Direct dependents of a resource, sorted by name.
  pub fn dependents(&self, name: &ResourceName) -> Vec<ResourceName> {
    self.neighbors(name, Direction::Outgoing)
  }

  fn neighbors(&self, name: &ResourceName, direction: Direction) -> Vec<ResourceName> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut names: Vec<ResourceName> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|neighbor| self.graph[neighbor].clone())
      .collect();
    names.sort();
    names.dedup();
    names
  }

  pub fn contains(&self, name: &ResourceName) -> bool {
    self.nodes.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
