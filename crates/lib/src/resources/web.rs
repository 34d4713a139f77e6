use serde::Serialize;
use serde_json::{Value, json};

use crate::graph::Context;
use crate::output::{Input, Output, OutputError};
use crate::resource::{Properties, ResourceKind, ResourceOptions, ResourceState};

use super::ConnectionStringType;

/// Pricing tier of an App Service plan, e.g. `Free` / `F1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuDescription {
  pub tier: String,
  pub name: String,
}

impl SkuDescription {
  pub fn new(tier: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      tier: tier.into(),
      name: name.into(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppServicePlanArgs {
  pub resource_group_name: Input<String>,
  /// Plan kind, e.g. `"App"` or `"Linux"`.
  pub kind: Input<String>,
  pub sku: SkuDescription,
  /// Backend name; defaults to the logical name.
  pub name: Option<Input<String>>,
}

/// An App Service plan (server farm).
#[derive(Debug, Clone)]
pub struct AppServicePlan {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub sku_tier: Output<String>,
  pub sku_name: Output<String>,
}

impl AppServicePlan {
  pub fn new(ctx: &mut Context, name: &str, args: AppServicePlanArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("kind", args.kind)
      .set("sku", Input::Value(args.sku))
      .set_opt("name", args.name);
    let state = ctx.register(ResourceKind::AppServicePlan, name, properties, ResourceOptions::default());

    let sku = state.property("sku");
    Self {
      id: state.id(),
      name: state.property_str("name"),
      sku_tier: sku.try_map(|sku| nested_str(&sku, "sku", "tier")),
      sku_name: sku.try_map(|sku| nested_str(&sku, "sku", "name")),
      state,
    }
  }
}

fn nested_str(value: &Value, object: &str, field: &str) -> Result<String, OutputError> {
  value
    .get(field)
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| OutputError::Transform(format!("'{object}' has no string field '{field}'")))
}

/// An application setting of a web app.
#[derive(Debug, Clone)]
pub struct NameValuePair {
  pub name: String,
  pub value: Input<String>,
}

/// A connection string of a web app.
#[derive(Debug, Clone)]
pub struct ConnStringInfo {
  pub name: String,
  pub kind: ConnectionStringType,
  pub connection_string: Input<String>,
}

/// Site configuration of a web app.
#[derive(Debug, Clone, Default)]
pub struct SiteConfigArgs {
  pub app_settings: Vec<NameValuePair>,
  pub connection_strings: Vec<ConnStringInfo>,
}

impl SiteConfigArgs {
  /// Combines every setting into the wire object once all values resolve.
  ///
  /// The result is secret if any setting is, and depends on every resource
  /// any setting is derived from.
  pub fn into_output(self) -> Output<Value> {
    let settings = Output::all(self.app_settings.into_iter().map(|pair| {
      let name = pair.name;
      pair
        .value
        .into_output()
        .map(move |value| json!({ "name": name, "value": value }))
    }));
    let connection_strings = Output::all(self.connection_strings.into_iter().map(|info| {
      let name = info.name;
      let kind = info.kind;
      info
        .connection_string
        .into_output()
        .map(move |value| json!({ "name": name, "type": kind, "connectionString": value }))
    }));

    settings
      .zip(&connection_strings)
      .map(|(settings, connection_strings)| json!({ "appSettings": settings, "connectionStrings": connection_strings }))
  }
}

#[derive(Debug, Clone)]
pub struct WebAppArgs {
  pub resource_group_name: Input<String>,
  /// Identifier of the App Service plan hosting the app.
  pub server_farm_id: Input<String>,
  pub site_config: SiteConfigArgs,
  /// Backend name; defaults to the logical name.
  pub name: Option<Input<String>>,
}

/// A web app hosted on an App Service plan.
#[derive(Debug, Clone)]
pub struct WebApp {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub kind: Output<String>,
  pub default_host_name: Output<String>,
}

impl WebApp {
  pub fn new(ctx: &mut Context, name: &str, args: WebAppArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("serverFarmId", args.server_farm_id)
      .set_output("siteConfig", args.site_config.into_output())
      .set_opt("name", args.name);
    let state = ctx.register(ResourceKind::WebApp, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      kind: state.property_str("kind"),
      default_host_name: state.property_str("defaultHostName"),
      state,
    }
  }
}
