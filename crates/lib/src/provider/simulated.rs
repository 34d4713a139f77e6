//! In-memory control plane.
//!
//! Mirrors the parts of the Azure resource manager the app-service program
//! touches: ARM-style ids, parent resources that must exist, globally unique
//! names for storage accounts, SQL servers and web apps, kind-specific
//! outputs, and service SAS tokens signed with a per-account key.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::resource::{ResourceKind, ResourceName};
use crate::state::StackState;
use crate::util::hash::hash_bytes;

use super::{Provider, ProviderError, ProvisionedResource, ResourceRequest};

/// Storage service version stamped into issued SAS tokens.
const SAS_VERSION: &str = "2022-11-02";

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// The backend operation behind a [`Submission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
  Create,
  Update,
  Read,
  Invoke,
}

/// One call received by the simulated backend.
///
/// `started` and `finished` are ticks of a logical clock shared by all
/// submissions, so they order calls relative to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
  pub name: ResourceName,
  pub operation: SubmissionKind,
  pub started: u64,
  pub finished: Option<u64>,
}

#[derive(Debug, Clone)]
struct Stored {
  name: ResourceName,
  kind: ResourceKind,
  physical: String,
  outputs: Map<String, Value>,
}

#[derive(Debug, Default)]
struct Inner {
  resources: BTreeMap<String, Stored>,
  submissions: Vec<Submission>,
}

/// A [`Provider`] that keeps every resource in memory.
#[derive(Debug)]
pub struct SimulatedProvider {
  location: String,
  latency: Option<Duration>,
  failures: HashMap<ResourceName, ProviderError>,
  clock: AtomicU64,
  inner: Mutex<Inner>,
}

impl SimulatedProvider {
  /// A backend whose resources default to `location`.
  pub fn new(location: impl Into<String>) -> Self {
    Self {
      location: location.into(),
      latency: None,
      failures: HashMap::new(),
      clock: AtomicU64::new(0),
      inner: Mutex::new(Inner::default()),
    }
  }

  /// Delays every call, so concurrent submissions actually overlap.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Makes every create, update or invoke of `name` fail with `error`.
  pub fn with_failure(mut self, name: impl Into<ResourceName>, error: ProviderError) -> Self {
    self.failures.insert(name.into(), error);
    self
  }

  /// Loads the resources recorded in a stack state, as if a previous run
  /// had created them.
  pub fn seeded(self, state: &StackState) -> Self {
    {
      let mut inner = self.lock();
      for (name, record) in &state.resources {
        let physical = record
          .outputs
          .get("name")
          .and_then(Value::as_str)
          .map(str::to_string)
          .unwrap_or_else(|| name.0.clone());
        inner.resources.insert(
          record.id.clone(),
          Stored {
            name: name.clone(),
            kind: record.kind,
            physical,
            outputs: record.outputs.clone(),
          },
        );
      }
    }
    debug!(stack = %state.stack, resources = state.resources.len(), "seeded simulated backend");
    self
  }

  /// Every call received so far, in arrival order.
  pub fn submissions(&self) -> Vec<Submission> {
    self.lock().submissions.clone()
  }

  /// Number of resources currently held.
  pub fn resource_count(&self) -> usize {
    self.lock().resources.len()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn tick(&self) -> u64 {
    self.clock.fetch_add(1, Ordering::SeqCst)
  }

  fn begin(&self, name: &ResourceName, operation: SubmissionKind) -> usize {
    let started = self.tick();
    let mut inner = self.lock();
    inner.submissions.push(Submission {
      name: name.clone(),
      operation,
      started,
      finished: None,
    });
    inner.submissions.len() - 1
  }

  fn finish(&self, ticket: usize) {
    let finished = self.tick();
    if let Some(submission) = self.lock().submissions.get_mut(ticket) {
      submission.finished = Some(finished);
    }
  }

  async fn delay(&self) {
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
  }

  fn injected_failure(&self, name: &ResourceName) -> Result<(), ProviderError> {
    match self.failures.get(name) {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }

  fn group_id(&self, group: &str) -> String {
    format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{group}")
  }

  /// Creates or updates a resource. `existing` is the id being updated.
  fn apply(&self, request: &ResourceRequest, existing: Option<&str>) -> Result<ProvisionedResource, ProviderError> {
    self.injected_failure(&request.name)?;

    let mut inner = self.lock();
    let (id, physical, outputs) = match request.kind {
      ResourceKind::ResourceGroup => self.resource_group(request)?,
      ResourceKind::StorageAccount => self.storage_account(&inner, request)?,
      ResourceKind::BlobContainer => self.blob_container(&inner, request)?,
      ResourceKind::Blob => self.blob(&inner, request)?,
      ResourceKind::AppInsights => self.app_insights(&inner, request)?,
      ResourceKind::SqlServer => self.sql_server(&inner, request)?,
      ResourceKind::SqlDatabase => self.sql_database(&inner, request)?,
      ResourceKind::AppServicePlan => self.app_service_plan(&inner, request)?,
      ResourceKind::WebApp => self.web_app(&inner, request)?,
      ResourceKind::ServiceSas => {
        return Err(ProviderError::Unsupported {
          kind: request.kind,
          operation: if existing.is_some() { "update" } else { "create" },
        });
      }
    };

    match existing {
      Some(existing) if existing != id => {
        return Err(ProviderError::InvalidArgument {
          property: "name".to_string(),
          message: format!("cannot change {existing} to {id} in place"),
        });
      }
      Some(_) => {}
      None => {
        if inner.resources.contains_key(&id) {
          return Err(ProviderError::Conflict {
            name: physical,
            existing: id,
          });
        }
      }
    }

    if is_globally_unique(request.kind)
      && let Some((taken, _)) = inner
        .resources
        .iter()
        .find(|(other, stored)| stored.kind == request.kind && stored.physical == physical && **other != id)
    {
      return Err(ProviderError::Conflict {
        name: physical,
        existing: taken.clone(),
      });
    }

    inner.resources.insert(
      id.clone(),
      Stored {
        name: request.name.clone(),
        kind: request.kind,
        physical,
        outputs: outputs.clone(),
      },
    );

    Ok(ProvisionedResource { id, outputs })
  }

  fn stored<'a>(&self, inner: &'a Inner, kind: ResourceKind, id: &str, what: &str) -> Result<&'a Stored, ProviderError> {
    inner
      .resources
      .get(id)
      .filter(|stored| stored.kind == kind)
      .ok_or_else(|| ProviderError::NotFound(format!("{what} {id}")))
  }

  /// Resource group name and location of a grouped resource.
  fn group(&self, inner: &Inner, request: &ResourceRequest) -> Result<(String, String), ProviderError> {
    let group = request.require_str("resourceGroupName")?;
    let stored = self.stored(inner, ResourceKind::ResourceGroup, &self.group_id(group), "resource group")?;
    let location = match request.get_str("location") {
      Some(location) => location.to_string(),
      None => stored
        .outputs
        .get("location")
        .and_then(Value::as_str)
        .unwrap_or(&self.location)
        .to_string(),
    };
    Ok((group.to_string(), location))
  }

  fn account_id(&self, group: &str, account: &str) -> String {
    format!(
      "{}/providers/Microsoft.Storage/storageAccounts/{account}",
      self.group_id(group)
    )
  }

  fn resource_group(&self, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let name = physical_name(request, "resourceGroupName");
    let location = request.get_str("location").unwrap_or(&self.location).to_string();
    let outputs = object(json!({
      "name": name,
      "location": location,
      "type": "Microsoft.Resources/resourceGroups",
      "provisioningState": "Succeeded",
    }));
    Ok((self.group_id(&name), name, outputs))
  }

  fn storage_account(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, location) = self.group(inner, request)?;
    let name = physical_name(request, "accountName");
    validate_storage_account_name(&name)?;
    let kind = request.require_str("kind")?;
    let sku = require_nested(request, "sku", "name")?;
    let tier = if sku.starts_with("Premium") { "Premium" } else { "Standard" };

    let outputs = object(json!({
      "name": name,
      "kind": kind,
      "location": location,
      "sku": { "name": sku, "tier": tier },
      "primaryEndpoints": {
        "blob": format!("https://{name}.blob.core.windows.net/"),
        "dfs": format!("https://{name}.dfs.core.windows.net/"),
        "file": format!("https://{name}.file.core.windows.net/"),
        "queue": format!("https://{name}.queue.core.windows.net/"),
        "table": format!("https://{name}.table.core.windows.net/"),
        "web": format!("https://{name}.z33.web.core.windows.net/"),
      },
      "type": "Microsoft.Storage/storageAccounts",
      "provisioningState": "Succeeded",
    }));
    Ok((self.account_id(&group, &name), name, outputs))
  }

  fn blob_container(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, _) = self.group(inner, request)?;
    let account = request.require_str("accountName")?;
    let account_id = self.account_id(&group, account);
    self.stored(inner, ResourceKind::StorageAccount, &account_id, "storage account")?;

    let name = physical_name(request, "containerName");
    let public_access = request.get_str("publicAccess").unwrap_or("None");
    let outputs = object(json!({
      "name": name,
      "publicAccess": public_access,
      "type": "Microsoft.Storage/storageAccounts/blobServices/containers",
    }));
    Ok((
      format!("{account_id}/blobServices/default/containers/{name}"),
      name,
      outputs,
    ))
  }

  fn blob(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, _) = self.group(inner, request)?;
    let account = request.require_str("accountName")?;
    let container = request.require_str("containerName")?;
    let container_id = format!(
      "{}/blobServices/default/containers/{container}",
      self.account_id(&group, account)
    );
    self.stored(inner, ResourceKind::BlobContainer, &container_id, "blob container")?;

    let source = request
      .inputs
      .get("source")
      .filter(|source| !source.is_null())
      .ok_or_else(|| ProviderError::MissingProperty("source".to_string()))?;
    let name = physical_name(request, "blobName");
    let blob_type = request.require_str("type")?;

    let mut outputs = object(json!({
      "name": name,
      "type": blob_type,
      "url": format!("https://{account}.blob.core.windows.net/{container}/{name}"),
      "accessTier": "Hot",
    }));
    if let Some(size) = source.get("size") {
      outputs.insert("contentLength".to_string(), size.clone());
    }
    if let Some(digest) = source.get("sha256") {
      outputs.insert("contentSha256".to_string(), digest.clone());
    }
    Ok((format!("{container_id}/blobs/{name}"), name, outputs))
  }

  fn app_insights(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, location) = self.group(inner, request)?;
    let name = physical_name(request, "resourceName");
    let application_type = request.require_str("applicationType")?;
    let kind = request.require_str("kind")?;
    let ingestion_mode = request.get_str("ingestionMode").unwrap_or("ApplicationInsights");

    let id = format!(
      "{}/providers/Microsoft.Insights/components/{name}",
      self.group_id(&group)
    );
    let key = derived_guid(&id, "instrumentationKey");
    let outputs = object(json!({
      "name": name,
      "kind": kind,
      "location": location,
      "applicationType": application_type,
      "ingestionMode": ingestion_mode,
      "instrumentationKey": key,
      "appId": derived_guid(&id, "appId"),
      "connectionString": format!(
        "InstrumentationKey={key};IngestionEndpoint=https://{location}-0.in.applicationinsights.azure.com/"
      ),
      "type": "Microsoft.Insights/components",
      "provisioningState": "Succeeded",
    }));
    Ok((id, name, outputs))
  }

  fn sql_server(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, location) = self.group(inner, request)?;
    let name = physical_name(request, "serverName");
    let login = request.require_str("administratorLogin")?;
    let password = request.require_str("administratorLoginPassword")?;
    if password.chars().count() < 8 {
      return Err(ProviderError::InvalidArgument {
        property: "administratorLoginPassword".to_string(),
        message: "must be at least 8 characters long".to_string(),
      });
    }
    let version = request.get_str("version").unwrap_or("12.0");

    let outputs = object(json!({
      "name": name,
      "location": location,
      "administratorLogin": login,
      "version": version,
      "fullyQualifiedDomainName": format!("{name}.database.windows.net"),
      "state": "Ready",
      "type": "Microsoft.Sql/servers",
    }));
    Ok((
      format!("{}/providers/Microsoft.Sql/servers/{name}", self.group_id(&group)),
      name,
      outputs,
    ))
  }

  fn sql_database(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, location) = self.group(inner, request)?;
    let server = request.require_str("serverName")?;
    let server_id = format!("{}/providers/Microsoft.Sql/servers/{server}", self.group_id(&group));
    self.stored(inner, ResourceKind::SqlServer, &server_id, "SQL server")?;

    let name = physical_name(request, "databaseName");
    let sku = require_nested(request, "sku", "name")?;
    let tier = match sku.chars().next() {
      Some('B') => "Basic",
      Some('S') => "Standard",
      Some('P') => "Premium",
      _ => "GeneralPurpose",
    };

    let outputs = object(json!({
      "name": name,
      "location": location,
      "sku": { "name": sku, "tier": tier },
      "status": "Online",
      "type": "Microsoft.Sql/servers/databases",
    }));
    Ok((format!("{server_id}/databases/{name}"), name, outputs))
  }

  fn app_service_plan(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, location) = self.group(inner, request)?;
    let name = physical_name(request, "name");
    let kind = request.get_str("kind").unwrap_or("app");
    let tier = require_nested(request, "sku", "tier")?;
    let sku = require_nested(request, "sku", "name")?;

    let outputs = object(json!({
      "name": name,
      "kind": kind,
      "location": location,
      "sku": { "name": sku, "tier": tier },
      "status": "Ready",
      "type": "Microsoft.Web/serverfarms",
    }));
    Ok((
      format!("{}/providers/Microsoft.Web/serverfarms/{name}", self.group_id(&group)),
      name,
      outputs,
    ))
  }

  fn web_app(&self, inner: &Inner, request: &ResourceRequest) -> Result<Resolved, ProviderError> {
    let (group, location) = self.group(inner, request)?;
    let farm = request.require_str("serverFarmId")?;
    self.stored(inner, ResourceKind::AppServicePlan, farm, "app service plan")?;

    if let Some(config) = request.inputs.get("siteConfig")
      && !config.is_object()
    {
      return Err(ProviderError::InvalidArgument {
        property: "siteConfig".to_string(),
        message: "expected an object".to_string(),
      });
    }

    let name = physical_name(request, "name");
    let host = format!("{name}.azurewebsites.net");
    let outputs = object(json!({
      "name": name,
      "kind": "app",
      "location": location,
      "defaultHostName": host,
      "enabledHostNames": [host, format!("{name}.scm.azurewebsites.net")],
      "serverFarmId": farm,
      "state": "Running",
      "httpsOnly": false,
      "type": "Microsoft.Web/sites",
    }));
    Ok((
      format!("{}/providers/Microsoft.Web/sites/{name}", self.group_id(&group)),
      name,
      outputs,
    ))
  }

  fn service_sas(&self, request: &ResourceRequest) -> Result<Map<String, Value>, ProviderError> {
    let inner = self.lock();
    let (group, _) = self.group(&inner, request)?;
    let account = request.require_str("accountName")?;
    let account_id = self.account_id(&group, account);
    self.stored(&inner, ResourceKind::StorageAccount, &account_id, "storage account")?;
    drop(inner);

    let canonicalized = request.require_str("canonicalizedResource")?;
    let prefix = format!("/blob/{account}/");
    if !canonicalized.starts_with(&prefix) || canonicalized.len() == prefix.len() {
      return Err(ProviderError::InvalidArgument {
        property: "canonicalizedResource".to_string(),
        message: format!("expected {prefix}<container>, got {canonicalized}"),
      });
    }

    let resource = request.require_str("resource")?;
    if !matches!(resource, "b" | "c" | "f" | "s") {
      return Err(ProviderError::InvalidArgument {
        property: "resource".to_string(),
        message: format!("unknown signed resource '{resource}'"),
      });
    }
    let permissions = request.require_str("permissions")?;
    let expiry = request.require_str("sharedAccessExpiryTime")?;

    let optional = |key: &str| request.get_str(key).unwrap_or_default().to_string();
    let fields = [
      ("sv", SAS_VERSION.to_string()),
      ("sr", resource.to_string()),
      ("st", optional("sharedAccessStartTime")),
      ("se", expiry.to_string()),
      ("sp", permissions.to_string()),
      ("spr", optional("protocols")),
      ("rscc", optional("cacheControl")),
      ("rscd", optional("contentDisposition")),
      ("rsce", optional("contentEncoding")),
      ("rsct", optional("contentType")),
    ];

    let key = hash_bytes(format!("{SUBSCRIPTION}:{account_id}").as_bytes());
    let mut string_to_sign: Vec<&str> = fields.iter().map(|(_, value)| value.as_str()).collect();
    string_to_sign.push(canonicalized);
    string_to_sign.push(&key.0);
    let signature = hash_bytes(string_to_sign.join("\n").as_bytes());

    let token = fields
      .iter()
      .filter(|(_, value)| !value.is_empty())
      .map(|(field, value)| format!("{field}={}", urlencoding::encode(value)))
      .chain(std::iter::once(format!("sig={signature}")))
      .collect::<Vec<_>>()
      .join("&");

    Ok(object(json!({ "serviceSasToken": token })))
  }
}

type Resolved = (String, String, Map<String, Value>);

fn is_globally_unique(kind: ResourceKind) -> bool {
  matches!(
    kind,
    ResourceKind::StorageAccount | ResourceKind::SqlServer | ResourceKind::WebApp
  )
}

/// The backend name of a resource: an explicit name input, else the logical name.
fn physical_name(request: &ResourceRequest, property: &str) -> String {
  request
    .get_str(property)
    .map(str::to_string)
    .unwrap_or_else(|| request.name.0.clone())
}

fn require_nested<'a>(request: &'a ResourceRequest, object: &str, field: &str) -> Result<&'a str, ProviderError> {
  request
    .inputs
    .get(object)
    .and_then(|value| value.get(field))
    .and_then(Value::as_str)
    .ok_or_else(|| ProviderError::MissingProperty(format!("{object}.{field}")))
}

fn validate_storage_account_name(name: &str) -> Result<(), ProviderError> {
  let valid_chars = name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
  if (3..=24).contains(&name.len()) && valid_chars {
    return Ok(());
  }
  Err(ProviderError::InvalidArgument {
    property: "accountName".to_string(),
    message: format!("'{name}' must be 3 to 24 lowercase letters or digits"),
  })
}

/// A stable GUID derived from a resource id.
fn derived_guid(id: &str, purpose: &str) -> String {
  let digest = Sha256::digest(format!("{purpose}:{id}").as_bytes());
  let mut bytes = [0u8; 16];
  bytes.copy_from_slice(&digest[..16]);
  uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

fn object(value: Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map,
    _ => Map::new(),
  }
}

#[async_trait]
impl Provider for SimulatedProvider {
  async fn create(&self, request: &ResourceRequest) -> Result<ProvisionedResource, ProviderError> {
    let ticket = self.begin(&request.name, SubmissionKind::Create);
    self.delay().await;
    let result = self.apply(request, None);
    self.finish(ticket);

    if let Ok(created) = &result {
      info!(resource = %request.name, kind = %request.kind, id = %created.id, "created");
    }
    result
  }

  async fn update(&self, id: &str, request: &ResourceRequest) -> Result<ProvisionedResource, ProviderError> {
    let ticket = self.begin(&request.name, SubmissionKind::Update);
    self.delay().await;
    let result = {
      let known = self.lock().resources.get(id).is_some_and(|stored| stored.kind == request.kind);
      if known {
        self.apply(request, Some(id))
      } else {
        Err(ProviderError::NotFound(id.to_string()))
      }
    };
    self.finish(ticket);

    if result.is_ok() {
      info!(resource = %request.name, kind = %request.kind, id, "updated");
    }
    result
  }

  async fn read(&self, kind: ResourceKind, id: &str) -> Result<ProvisionedResource, ProviderError> {
    let stored = self.lock().resources.get(id).filter(|stored| stored.kind == kind).cloned();
    let name = stored
      .as_ref()
      .map(|stored| stored.name.clone())
      .unwrap_or_else(|| ResourceName::from(id));

    let ticket = self.begin(&name, SubmissionKind::Read);
    self.delay().await;
    self.finish(ticket);

    stored
      .map(|stored| ProvisionedResource {
        id: id.to_string(),
        outputs: stored.outputs,
      })
      .ok_or_else(|| ProviderError::NotFound(id.to_string()))
  }

  async fn invoke(&self, request: &ResourceRequest) -> Result<Map<String, Value>, ProviderError> {
    let ticket = self.begin(&request.name, SubmissionKind::Invoke);
    self.delay().await;
    let result = self.injected_failure(&request.name).and_then(|()| match request.kind {
      ResourceKind::ServiceSas => self.service_sas(request),
      kind => Err(ProviderError::Unsupported {
        kind,
        operation: "invoke",
      }),
    });
    self.finish(ticket);

    if result.is_ok() {
      debug!(resource = %request.name, kind = %request.kind, "invoked");
    }
    result
  }
}
