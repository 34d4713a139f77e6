//! Typed resource declarations.
//!
//! Each resource has an argument struct (literal or deferred [`Input`]s) and
//! a handle whose fields are the resource's [`Output`]s. Creating a handle
//! registers the resource with a [`Context`](crate::graph::Context); nothing
//! is provisioned until the engine runs.
//!
//! [`Input`]: crate::output::Input
//! [`Output`]: crate::output::Output

mod group;
mod insights;
mod sql;
mod storage;
mod web;

pub use group::{ResourceGroup, ResourceGroupArgs};
pub use insights::{Component, ComponentArgs};
pub use sql::{Database, DatabaseArgs, Server, ServerArgs};
pub use storage::{
  Blob, BlobArgs, BlobContainer, BlobContainerArgs, ServiceSas, ServiceSasArgs, StorageAccount, StorageAccountArgs,
};
pub use web::{
  AppServicePlan, AppServicePlanArgs, ConnStringInfo, NameValuePair, SiteConfigArgs, SkuDescription, WebApp,
  WebAppArgs,
};

use serde::Serialize;

/// Storage account kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageKind {
  StorageV2,
  BlobStorage,
}

/// Storage account replication SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkuName {
  #[serde(rename = "Standard_LRS")]
  StandardLrs,
  #[serde(rename = "Standard_GRS")]
  StandardGrs,
  #[serde(rename = "Premium_LRS")]
  PremiumLrs,
}

/// Anonymous access level of a blob container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PublicAccess {
  None,
  Blob,
  Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlobType {
  Block,
  Append,
  Page,
}

/// Protocols a SAS token may be used over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HttpProtocol {
  #[serde(rename = "https")]
  Https,
  #[serde(rename = "https,http")]
  HttpsHttp,
}

/// What a service SAS grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignedResource {
  #[serde(rename = "b")]
  Blob,
  #[serde(rename = "c")]
  Container,
  #[serde(rename = "f")]
  File,
  #[serde(rename = "s")]
  Share,
}

/// SAS permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Permissions {
  #[serde(rename = "r")]
  Read,
  #[serde(rename = "rl")]
  ReadList,
  #[serde(rename = "w")]
  Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApplicationType {
  #[serde(rename = "web")]
  Web,
  #[serde(rename = "other")]
  Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestionMode {
  ApplicationInsights,
  ApplicationInsightsWithDiagnosticSettings,
  LogAnalytics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStringType {
  #[serde(rename = "SQLAzure")]
  SqlAzure,
  #[serde(rename = "SQLServer")]
  SqlServer,
  Custom,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn enums_use_wire_names() {
    assert_eq!(serde_json::to_value(SkuName::StandardLrs).unwrap(), json!("Standard_LRS"));
    assert_eq!(serde_json::to_value(StorageKind::StorageV2).unwrap(), json!("StorageV2"));
    assert_eq!(serde_json::to_value(SignedResource::Container).unwrap(), json!("c"));
    assert_eq!(serde_json::to_value(Permissions::Read).unwrap(), json!("r"));
    assert_eq!(serde_json::to_value(HttpProtocol::Https).unwrap(), json!("https"));
    assert_eq!(serde_json::to_value(ConnectionStringType::SqlAzure).unwrap(), json!("SQLAzure"));
    assert_eq!(serde_json::to_value(PublicAccess::None).unwrap(), json!("None"));
    assert_eq!(serde_json::to_value(ApplicationType::Web).unwrap(), json!("web"));
  }
}
