//! The App Service topology.
//!
//! Declares a web app running from a zip package in blob storage, with
//! Application Insights and an Azure SQL database:
//!
//! ```text
//! appservicerg ─┬─ appservicesa ─┬─ appservice-c ── appservice-b ─┐
//!               │                └──────────────── appservice-sas ┤
//!               ├─ appservice-ai ────────────────────────────────┤
//!               ├─ appservice-sql ── appservice-db ───────────────┼─ appservice-as
//!               └─ appservice-asp ────────────────────────────────┘
//! ```
//!
//! Exports `web_app_url`, `scm_web_app_url`, `log_tail_command` and
//! `web_ssh_url`.

use std::path::PathBuf;

use tracing::info;

use crate::assemble::{
  SAS_EXPIRY, SAS_START, app_insights_connection_string, canonicalized_resource, log_tail_command, scm_host,
  signed_blob_url, sql_connection_string, web_ssh_url,
};
use crate::config::StackConfig;
use crate::graph::Context;
use crate::output::{Input, Output};
use crate::package::FileArchive;
use crate::resources::{
  AppServicePlan, AppServicePlanArgs, ApplicationType, Blob, BlobArgs, BlobContainer, BlobContainerArgs, BlobType,
  Component, ComponentArgs, ConnStringInfo, ConnectionStringType, Database, DatabaseArgs, HttpProtocol, IngestionMode,
  NameValuePair, Permissions, PublicAccess, ResourceGroup, ResourceGroupArgs, Server, ServerArgs, ServiceSas,
  ServiceSasArgs, SignedResource, SiteConfigArgs, SkuDescription, SkuName, StorageAccount, StorageAccountArgs,
  StorageKind, WebApp, WebAppArgs,
};
use crate::stack::{Program, ProgramError};

/// Project name of the topology.
pub const PROJECT: &str = "azure-appservice";

/// SQL administrator login.
pub const SQL_USERNAME: &str = "pulumi";

pub const LOCATION_KEY: &str = "location";
pub const SQL_PASSWORD_KEY: &str = "sqlPassword";

/// Handles of every declared resource.
#[derive(Debug, Clone)]
pub struct AppService {
  pub resource_group: ResourceGroup,
  pub storage_account: StorageAccount,
  pub container: BlobContainer,
  pub blob: Blob,
  pub sas: ServiceSas,
  pub insights: Component,
  pub sql_server: Server,
  pub database: Database,
  pub plan: AppServicePlan,
  pub web_app: WebApp,
}

/// The topology as a [`Program`], packaging `package_dir` when it runs.
#[derive(Debug, Clone)]
pub struct AppServiceProgram {
  package_dir: PathBuf,
}

impl AppServiceProgram {
  pub fn new(package_dir: impl Into<PathBuf>) -> Self {
    Self {
      package_dir: package_dir.into(),
    }
  }
}

impl Program for AppServiceProgram {
  fn declare(self, ctx: &mut Context, config: &StackConfig) -> Result<(), ProgramError> {
    let archive = FileArchive::from_dir(&self.package_dir)?;
    declare(ctx, config, &archive)?;
    Ok(())
  }
}

/// Declares the topology and its exports.
///
/// Fails if `location` or `sqlPassword` is not configured, or is blank.
pub fn declare(ctx: &mut Context, config: &StackConfig, archive: &FileArchive) -> Result<AppService, ProgramError> {
  let location = config.require(LOCATION_KEY)?;
  if location.trim().is_empty() {
    return Err(ProgramError::Invalid(format!("'{LOCATION_KEY}' must not be empty")));
  }
  let password = config.require_secret(SQL_PASSWORD_KEY)?;
  if password.is_empty() {
    return Err(ProgramError::Invalid(format!("'{SQL_PASSWORD_KEY}' must not be empty")));
  }
  let password = Output::secret(password.expose().to_string());

  let resource_group = ResourceGroup::new(
    ctx,
    "appservicerg",
    ResourceGroupArgs {
      location: Some(location.into()),
      ..Default::default()
    },
  );
  let group_name = || Input::from(&resource_group.name);

  let storage_account = StorageAccount::new(
    ctx,
    "appservicesa",
    StorageAccountArgs {
      resource_group_name: group_name(),
      kind: StorageKind::StorageV2,
      sku: SkuName::StandardLrs,
      account_name: None,
      location: None,
    },
  );

  let plan = AppServicePlan::new(
    ctx,
    "appservice-asp",
    AppServicePlanArgs {
      resource_group_name: group_name(),
      kind: "App".into(),
      sku: SkuDescription::new("Free", "F1"),
      name: None,
    },
  );

  let container = BlobContainer::new(
    ctx,
    "appservice-c",
    BlobContainerArgs {
      resource_group_name: group_name(),
      account_name: (&storage_account.name).into(),
      public_access: PublicAccess::None,
      container_name: None,
    },
  );

  let blob = Blob::new(
    ctx,
    "appservice-b",
    BlobArgs {
      resource_group_name: group_name(),
      account_name: (&storage_account.name).into(),
      container_name: (&container.name).into(),
      blob_type: BlobType::Block,
      source: archive.descriptor(),
      blob_name: None,
    },
  );

  let sas = ServiceSas::new(
    ctx,
    "appservice-sas",
    ServiceSasArgs {
      resource_group_name: group_name(),
      account_name: (&storage_account.name).into(),
      canonicalized_resource: storage_account
        .name
        .zip(&container.name)
        .map(|(account, container)| canonicalized_resource(&account, &container))
        .into(),
      resource: SignedResource::Container,
      permissions: Permissions::Read,
      protocols: HttpProtocol::Https,
      shared_access_start_time: Some(SAS_START.into()),
      shared_access_expiry_time: SAS_EXPIRY.into(),
      cache_control: Some("max-age=5".into()),
      content_disposition: Some("inline".into()),
      content_encoding: Some("deflate".into()),
      content_type: Some("application/json".into()),
    },
  );

  let signed_url = Output::all([
    storage_account.name.clone(),
    container.name.clone(),
    blob.name.clone(),
    sas.service_sas_token.clone(),
  ])
  .map(|parts| signed_blob_url(&parts[0], &parts[1], &parts[2], &parts[3]));

  let insights = Component::new(
    ctx,
    "appservice-ai",
    ComponentArgs {
      resource_group_name: group_name(),
      application_type: ApplicationType::Web,
      kind: "web".into(),
      ingestion_mode: Some(IngestionMode::ApplicationInsights),
      resource_name: None,
      location: None,
    },
  );

  let sql_server = Server::new(
    ctx,
    "appservice-sql",
    ServerArgs {
      resource_group_name: group_name(),
      administrator_login: SQL_USERNAME.into(),
      administrator_login_password: (&password).into(),
      version: Some("12.0".into()),
      server_name: None,
    },
  );

  let database = Database::new(
    ctx,
    "appservice-db",
    DatabaseArgs {
      resource_group_name: group_name(),
      server_name: (&sql_server.name).into(),
      sku_name: "S0".into(),
      database_name: None,
    },
  );

  let connection_string = sql_server
    .name
    .zip(&database.name)
    .zip(&password)
    .map(|((server, database), password)| sql_connection_string(&server, &database, SQL_USERNAME, &password));

  let web_app = WebApp::new(
    ctx,
    "appservice-as",
    WebAppArgs {
      resource_group_name: group_name(),
      server_farm_id: (&plan.id).into(),
      site_config: SiteConfigArgs {
        app_settings: vec![
          NameValuePair {
            name: "APPINSIGHTS_INSTRUMENTATIONKEY".to_string(),
            value: (&insights.instrumentation_key).into(),
          },
          NameValuePair {
            name: "APPLICATIONINSIGHTS_CONNECTION_STRING".to_string(),
            value: insights
              .instrumentation_key
              .map(|key| app_insights_connection_string(&key))
              .into(),
          },
          NameValuePair {
            name: "ApplicationInsightsAgent_EXTENSION_VERSION".to_string(),
            value: "~2".into(),
          },
          NameValuePair {
            name: "WEBSITE_RUN_FROM_PACKAGE".to_string(),
            value: signed_url.into(),
          },
        ],
        connection_strings: vec![ConnStringInfo {
          name: "db".to_string(),
          kind: ConnectionStringType::SqlAzure,
          connection_string: connection_string.into(),
        }],
      },
      name: None,
    },
  );

  let host = &web_app.default_host_name;
  ctx.export::<String>(
    "web_app_url",
    Output::concat([Input::from("http://"), Input::from(host)]),
  );
  ctx.export::<String>("scm_web_app_url", host.map(|host| format!("http://{}", scm_host(&host))));
  ctx.export::<String>(
    "log_tail_command",
    web_app
      .name
      .zip(&resource_group.name)
      .map(|(app, group)| log_tail_command(&app, &group)),
  );
  ctx.export::<String>("web_ssh_url", host.map(|host| web_ssh_url(&scm_host(&host))));

  host.map(|host| {
    let url = format!("http://{host}");
    info!(url = %url, "Web App URL: {url}");
  });

  Ok(AppService {
    resource_group,
    storage_account,
    container,
    blob,
    sas,
    insights,
    sql_server,
    database,
    plan,
    web_app,
  })
}
