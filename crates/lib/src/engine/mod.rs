//! Deployment engine.
//!
//! Walks a validated [`ResourceDag`] wave by wave and submits each resource
//! to a [`Provider`] once every input has resolved. Every output slot is
//! settled exactly once: with the backend's state on success, with an error
//! if the resource failed or was skipped, or with
//! [`OutputError::Abandoned`] if the graph failed validation.

mod types;

pub use types::{
  EngineConfig, EngineError, NodeError, Operation, PlannedOperation, PlannedStep, Preview, ProvisionError, UpResult,
};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::consts::REDACTED;
use crate::graph::{Context, Export, ResourceDag};
use crate::output::OutputError;
use crate::provider::{Provider, ProviderError, ResourceRequest};
use crate::resource::{Declaration, ResourceName, ResourceState};
use crate::secret::Secret;
use crate::state::{ExportValue, ResourceRecord, StackState};
use crate::util::hash::keyed_hash_json;

/// A resource the backend has answered for.
struct Provisioned {
  operation: Operation,
  state: ResourceState,
  record: Option<ResourceRecord>,
}

/// Provisions every resource declared in `context`.
///
/// Validation errors abort the run before any backend call. Backend
/// failures do not: the failing resource is recorded, its dependents are
/// skipped, and independent resources keep going. Use
/// [`UpResult::provision_error`] to turn recorded failures into an error.
pub async fn up(
  context: Context,
  provider: Arc<dyn Provider>,
  prior: Option<&StackState>,
  config: &EngineConfig,
) -> Result<UpResult, EngineError> {
  let (declarations, exports) = context.into_parts();
  info!(
    resources = declarations.len(),
    exports = exports.len(),
    "starting deployment"
  );

  let (dag, waves) = match ResourceDag::build(&declarations, &exports).and_then(|dag| {
    let waves = dag.waves()?;
    Ok((dag, waves))
  }) {
    Ok(validated) => validated,
    Err(e) => {
      error!(error = %e, "resource graph is invalid");
      abandon(&declarations);
      return Err(e.into());
    }
  };

  info!(wave_count = waves.len(), "computed provisioning waves");

  let mut result = UpResult::default();
  let mut failed_nodes: HashSet<ResourceName> = HashSet::new();
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let by_name: HashMap<ResourceName, &Declaration> = declarations.iter().map(|d| (d.name.clone(), d)).collect();

  for (wave_idx, wave) in waves.iter().enumerate() {
    debug!(wave = wave_idx, resources = wave.len(), "provisioning wave");

    let mut join_set = JoinSet::new();
    for name in wave {
      let declaration = by_name[name];

      if let Some(dependency) = dag.dependencies(name).into_iter().find(|dep| failed_nodes.contains(dep)) {
        warn!(
          resource = %name,
          failed_dep = %dependency,
          "skipping resource due to failed dependency"
        );
        declaration.state.settle(Err(OutputError::Skipped {
          resource: name.clone(),
          dependency: dependency.clone(),
        }));
        failed_nodes.insert(name.clone());
        result.skipped.insert(name.clone(), dependency);
        continue;
      }

      let declaration = declaration.clone();
      let provider = Arc::clone(&provider);
      let prior = prior.and_then(|state| state.resource(name)).cloned();
      let semaphore = Arc::clone(&semaphore);
      let salt = config.input_salt.clone();

      join_set.spawn(async move {
        let name = declaration.name.clone();
        let result = match semaphore.acquire().await {
          Ok(_permit) => provision(&declaration, provider.as_ref(), prior, &salt).await,
          Err(_) => Err(NodeError::Aborted),
        };
        (name, result)
      }
      .in_current_span());
    }

    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok((name, Ok(provisioned))) => {
          info!(resource = %name, operation = %provisioned.operation, "resource provisioned");
          by_name[&name].state.settle(Ok(provisioned.state));
          if let Some(record) = provisioned.record {
            result.resources.insert(name.clone(), record);
          }
          result.operations.insert(name, provisioned.operation);
        }
        Ok((name, Err(e))) => {
          error!(resource = %name, error = %e, "resource failed");
          by_name[&name].state.settle(Err(OutputError::Upstream {
            resource: name.clone(),
            message: e.to_string(),
          }));
          failed_nodes.insert(name.clone());
          result.failed.push((name, e));
        }
        Err(e) => {
          error!(error = %e, "provisioning task panicked");
        }
      }
    }

    // A task that panicked never reported back; its slot is still pending.
    for name in wave {
      let declaration = by_name[name];
      if declaration.state.settle(Err(OutputError::Abandoned)) {
        failed_nodes.insert(name.clone());
        result.failed.push((name.clone(), NodeError::Aborted));
      }
    }
  }

  resolve_exports(&exports, &mut result);

  if let Some(prior) = prior {
    let declared: BTreeSet<&ResourceName> = declarations.iter().map(|d| &d.name).collect();
    result.removed = prior
      .resources
      .keys()
      .filter(|name| !declared.contains(name))
      .cloned()
      .collect();
  }

  info!(
    created = result.count(Operation::Create),
    updated = result.count(Operation::Update),
    same = result.count(Operation::Same),
    invoked = result.count(Operation::Invoke),
    failed = result.failed.len(),
    skipped = result.skipped.len(),
    "deployment complete"
  );

  Ok(result)
}

/// Plans a run without calling the backend.
pub fn preview(context: &Context, prior: Option<&StackState>) -> Result<Preview, EngineError> {
  let dag = ResourceDag::build(context.declarations(), context.exports())?;
  let kinds: HashMap<&ResourceName, _> = context.declarations().iter().map(|d| (&d.name, d.kind)).collect();

  let waves: Vec<Vec<PlannedStep>> = dag
    .waves()?
    .into_iter()
    .map(|wave| {
      wave
        .into_iter()
        .map(|name| {
          let kind = kinds[&name];
          let operation = if kind.is_invoke() {
            PlannedOperation::Invoke
          } else if prior.and_then(|state| state.resource(&name)).is_some_and(|record| record.kind == kind) {
            PlannedOperation::Existing
          } else {
            PlannedOperation::Create
          };
          PlannedStep { name, kind, operation }
        })
        .collect()
    })
    .collect();

  let removed: Vec<ResourceName> = prior
    .map(|state| {
      state
        .resources
        .keys()
        .filter(|name| !dag.contains(name))
        .cloned()
        .collect()
    })
    .unwrap_or_default();

  Ok(Preview { waves, removed })
}

/// Settles every slot of an invalid graph without running any transform.
fn abandon(declarations: &[Declaration]) {
  for declaration in declarations {
    declaration.state.settle(Err(OutputError::Abandoned));
  }
}

fn resolve_exports(exports: &[Export], result: &mut UpResult) {
  for export in exports {
    match export.value.peek() {
      Some(Ok(value)) => {
        result.exports.insert(
          export.name.clone(),
          ExportValue {
            value,
            secret: export.value.is_secret(),
          },
        );
      }
      Some(Err(e)) => {
        warn!(export = %export.name, error = %e, "export did not resolve");
        result.export_errors.push((export.name.clone(), e));
      }
      None => {
        result.export_errors.push((export.name.clone(), OutputError::Abandoned));
      }
    }
  }
}

/// Resolves a resource's inputs and submits it.
///
/// A resource whose inputs hash the same as its prior record is only read
/// back: its outputs are refreshed and nothing is created or updated. If
/// the read finds it gone, it is created again.
async fn provision(
  declaration: &Declaration,
  provider: &dyn Provider,
  prior: Option<ResourceRecord>,
  salt: &Secret,
) -> Result<Provisioned, NodeError> {
  let mut inputs = Map::new();
  let mut redacted = Map::new();
  for (property, value) in declaration.properties.iter() {
    let resolved = value.value().await.map_err(|source| NodeError::Input {
      property: property.clone(),
      source,
    })?;
    let shown = if value.is_secret() {
      Value::String(REDACTED.to_string())
    } else {
      resolved.clone()
    };
    redacted.insert(property.clone(), shown);
    inputs.insert(property.clone(), resolved);
  }

  let inputs_hash = keyed_hash_json(salt, &inputs).map_err(|e| NodeError::Hash(e.to_string()))?;
  debug!(resource = %declaration.name, inputs = ?redacted, "resolved inputs");

  let kind = declaration.kind;
  let request = ResourceRequest {
    name: declaration.name.clone(),
    kind,
    inputs,
  };

  if kind.is_invoke() {
    let outputs = provider.invoke(&request).await?;
    return Ok(Provisioned {
      operation: Operation::Invoke,
      state: ResourceState {
        name: declaration.name.clone(),
        kind,
        id: String::new(),
        outputs,
      },
      record: None,
    });
  }

  let prior = prior.filter(|record| record.kind == kind);
  let current = match &prior {
    Some(record) if record.inputs_hash == inputs_hash => match provider.read(kind, &record.id).await {
      Ok(read) => Some(read),
      Err(ProviderError::NotFound(_)) => {
        warn!(resource = %declaration.name, id = %record.id, "resource is gone from the backend; creating it again");
        None
      }
      Err(e) => return Err(e.into()),
    },
    _ => None,
  };

  let (operation, id, outputs) = match (current, prior) {
    (Some(read), _) => (Operation::Same, read.id, read.outputs),
    (None, Some(record)) if record.inputs_hash != inputs_hash => {
      let updated = provider.update(&record.id, &request).await?;
      (Operation::Update, updated.id, updated.outputs)
    }
    (None, _) => {
      let created = provider.create(&request).await?;
      (Operation::Create, created.id, created.outputs)
    }
  };

  Ok(Provisioned {
    operation,
    state: ResourceState {
      name: declaration.name.clone(),
      kind,
      id: id.clone(),
      outputs: outputs.clone(),
    },
    record: Some(ResourceRecord {
      kind,
      id,
      inputs: redacted,
      inputs_hash,
      outputs,
    }),
  })
}
