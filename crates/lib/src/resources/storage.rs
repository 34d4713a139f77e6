use serde_json::{Value, json};

use crate::graph::Context;
use crate::output::{Input, Output, OutputError};
use crate::package::ArchiveDescriptor;
use crate::resource::{Properties, ResourceKind, ResourceOptions, ResourceState};

use super::{BlobType, HttpProtocol, Permissions, PublicAccess, SignedResource, SkuName, StorageKind};

#[derive(Debug, Clone)]
pub struct StorageAccountArgs {
  pub resource_group_name: Input<String>,
  pub kind: StorageKind,
  pub sku: SkuName,
  /// Backend name; defaults to the logical name.
  pub account_name: Option<Input<String>>,
  pub location: Option<Input<String>>,
}

/// A storage account.
#[derive(Debug, Clone)]
pub struct StorageAccount {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub kind: Output<String>,
  pub primary_blob_endpoint: Output<String>,
}

impl StorageAccount {
  pub fn new(ctx: &mut Context, name: &str, args: StorageAccountArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("kind", Input::Value(args.kind))
      .set("sku", Input::Value(json!({ "name": args.sku })))
      .set_opt("accountName", args.account_name)
      .set_opt("location", args.location);
    let state = ctx.register(ResourceKind::StorageAccount, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      kind: state.property_str("kind"),
      primary_blob_endpoint: state
        .property("primaryEndpoints")
        .try_map(|endpoints| blob_endpoint(&endpoints)),
      state,
    }
  }
}

fn blob_endpoint(endpoints: &Value) -> Result<String, OutputError> {
  endpoints
    .get("blob")
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| OutputError::Transform("storage account reported no blob endpoint".to_string()))
}

#[derive(Debug, Clone)]
pub struct BlobContainerArgs {
  pub resource_group_name: Input<String>,
  pub account_name: Input<String>,
  pub public_access: PublicAccess,
  /// Backend name; defaults to the logical name.
  pub container_name: Option<Input<String>>,
}

/// A blob container within a storage account.
#[derive(Debug, Clone)]
pub struct BlobContainer {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub public_access: Output<String>,
}

impl BlobContainer {
  pub fn new(ctx: &mut Context, name: &str, args: BlobContainerArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("accountName", args.account_name)
      .set("publicAccess", Input::Value(args.public_access))
      .set_opt("containerName", args.container_name);
    let state = ctx.register(ResourceKind::BlobContainer, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      public_access: state.property_str("publicAccess"),
      state,
    }
  }
}

#[derive(Debug, Clone)]
pub struct BlobArgs {
  pub resource_group_name: Input<String>,
  pub account_name: Input<String>,
  pub container_name: Input<String>,
  pub blob_type: BlobType,
  /// The uploaded content. Its digest is part of the inputs, so changed
  /// content updates the blob.
  pub source: ArchiveDescriptor,
  /// Backend name; defaults to the logical name.
  pub blob_name: Option<Input<String>>,
}

/// A blob uploaded from a local archive.
#[derive(Debug, Clone)]
pub struct Blob {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub url: Output<String>,
}

impl Blob {
  pub fn new(ctx: &mut Context, name: &str, args: BlobArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("accountName", args.account_name)
      .set("containerName", args.container_name)
      .set("type", Input::Value(args.blob_type))
      .set("source", Input::Value(args.source))
      .set_opt("blobName", args.blob_name);
    let state = ctx.register(ResourceKind::Blob, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      url: state.property_str("url"),
      state,
    }
  }
}

/// Arguments of a service SAS request.
#[derive(Debug, Clone)]
pub struct ServiceSasArgs {
  pub resource_group_name: Input<String>,
  pub account_name: Input<String>,
  pub canonicalized_resource: Input<String>,
  pub resource: SignedResource,
  pub permissions: Permissions,
  pub protocols: HttpProtocol,
  pub shared_access_start_time: Option<Input<String>>,
  pub shared_access_expiry_time: Input<String>,
  pub cache_control: Option<Input<String>>,
  pub content_disposition: Option<Input<String>>,
  pub content_encoding: Option<Input<String>>,
  pub content_type: Option<Input<String>>,
}

/// A service SAS token issued by the backend.
///
/// This is an invoke: it is requested again on every run and never stored.
#[derive(Debug, Clone)]
pub struct ServiceSas {
  pub state: Output<ResourceState>,
  /// The token query string, without a leading `?`. Always secret.
  pub service_sas_token: Output<String>,
}

impl ServiceSas {
  pub fn new(ctx: &mut Context, name: &str, args: ServiceSasArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("accountName", args.account_name)
      .set("canonicalizedResource", args.canonicalized_resource)
      .set("resource", Input::Value(args.resource))
      .set("permissions", Input::Value(args.permissions))
      .set("protocols", Input::Value(args.protocols))
      .set_opt("sharedAccessStartTime", args.shared_access_start_time)
      .set("sharedAccessExpiryTime", args.shared_access_expiry_time)
      .set_opt("cacheControl", args.cache_control)
      .set_opt("contentDisposition", args.content_disposition)
      .set_opt("contentEncoding", args.content_encoding)
      .set_opt("contentType", args.content_type);
    let state = ctx.register(ResourceKind::ServiceSas, name, properties, ResourceOptions::default());

    Self {
      service_sas_token: state.property_str("serviceSasToken").as_secret(),
      state,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use serde_json::{Map, json};

  use super::*;
  use crate::resource::ResourceName;
  use crate::util::hash::ContentHash;

  fn declared(ctx: &Context, name: &str) -> Map<String, Value> {
    let declaration = ctx.declarations().iter().find(|d| d.name.0 == name).unwrap();
    declaration
      .properties
      .iter()
      .filter_map(|(key, value)| value.peek().and_then(Result::ok).map(|v| (key.clone(), v)))
      .collect()
  }

  #[test]
  fn storage_account_literal_settings() {
    let mut ctx = Context::new("test", "dev");
    StorageAccount::new(
      &mut ctx,
      "appservicesa",
      StorageAccountArgs {
        resource_group_name: "appservicerg".into(),
        kind: StorageKind::StorageV2,
        sku: SkuName::StandardLrs,
        account_name: None,
        location: None,
      },
    );

    let inputs = declared(&ctx, "appservicesa");
    assert_eq!(inputs["kind"], json!("StorageV2"));
    assert_eq!(inputs["sku"], json!({ "name": "Standard_LRS" }));
    assert!(!inputs.contains_key("accountName"));
  }

  #[test]
  fn blob_endpoint_projection() {
    let mut ctx = Context::new("test", "dev");
    let account = StorageAccount::new(
      &mut ctx,
      "appservicesa",
      StorageAccountArgs {
        resource_group_name: "appservicerg".into(),
        kind: StorageKind::StorageV2,
        sku: SkuName::StandardLrs,
        account_name: None,
        location: None,
      },
    );

    let mut outputs = Map::new();
    outputs.insert("name".to_string(), json!("appservicesa"));
    outputs.insert(
      "primaryEndpoints".to_string(),
      json!({ "blob": "https://appservicesa.blob.core.windows.net/" }),
    );
    account.state.settle(Ok(ResourceState {
      name: ResourceName::from("appservicesa"),
      kind: ResourceKind::StorageAccount,
      id: "id".to_string(),
      outputs,
    }));

    assert_eq!(
      account.primary_blob_endpoint.peek(),
      Some(Ok("https://appservicesa.blob.core.windows.net/".to_string()))
    );
    assert_eq!(account.name.peek(), Some(Ok("appservicesa".to_string())));
  }

  #[test]
  fn blob_source_carries_the_archive_digest() {
    let mut ctx = Context::new("test", "dev");
    Blob::new(
      &mut ctx,
      "appservice-b",
      BlobArgs {
        resource_group_name: "appservicerg".into(),
        account_name: "appservicesa".into(),
        container_name: "appservice-c".into(),
        blob_type: BlobType::Block,
        source: ArchiveDescriptor {
          sha256: ContentHash("ab".repeat(32)),
          size: 1024,
          files: 3,
        },
        blob_name: None,
      },
    );

    let inputs = declared(&ctx, "appservice-b");
    assert_eq!(inputs["type"], json!("Block"));
    assert_eq!(inputs["source"]["size"], json!(1024));
    assert_eq!(inputs["source"]["sha256"], json!("ab".repeat(32)));
  }

  #[test]
  fn sas_token_is_secret_and_depends_on_the_request() {
    let mut ctx = Context::new("test", "dev");
    let sas = ServiceSas::new(
      &mut ctx,
      "appservice-sas",
      ServiceSasArgs {
        resource_group_name: "appservicerg".into(),
        account_name: "appservicesa".into(),
        canonicalized_resource: "/blob/appservicesa/appservice-c".into(),
        resource: SignedResource::Container,
        permissions: Permissions::Read,
        protocols: HttpProtocol::Https,
        shared_access_start_time: Some("2021-01-01".into()),
        shared_access_expiry_time: "2030-01-01".into(),
        cache_control: Some("max-age=5".into()),
        content_disposition: None,
        content_encoding: None,
        content_type: None,
      },
    );

    assert!(sas.service_sas_token.is_secret());
    assert_eq!(
      sas.service_sas_token.dependencies(),
      &BTreeSet::from([ResourceName::from("appservice-sas")])
    );
    let inputs = declared(&ctx, "appservice-sas");
    assert_eq!(inputs["resource"], json!("c"));
    assert_eq!(inputs["permissions"], json!("r"));
    assert_eq!(inputs.len(), 9);
  }
}
