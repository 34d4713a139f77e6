use serde_json::json;

use crate::graph::Context;
use crate::output::{Input, Output};
use crate::resource::{Properties, ResourceKind, ResourceOptions, ResourceState};

#[derive(Debug, Clone)]
pub struct ServerArgs {
  pub resource_group_name: Input<String>,
  pub administrator_login: Input<String>,
  /// Always treated as secret, whether or not the input already is.
  pub administrator_login_password: Input<String>,
  pub version: Option<Input<String>>,
  /// Backend name; defaults to the logical name.
  pub server_name: Option<Input<String>>,
}

/// An Azure SQL logical server.
#[derive(Debug, Clone)]
pub struct Server {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub fully_qualified_domain_name: Output<String>,
  pub administrator_login: Output<String>,
  pub version: Output<String>,
}

impl Server {
  pub fn new(ctx: &mut Context, name: &str, args: ServerArgs) -> Self {
    let password = args.administrator_login_password.into_output().as_secret();
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("administratorLogin", args.administrator_login)
      .set("administratorLoginPassword", Input::Output(password))
      .set_opt("version", args.version)
      .set_opt("serverName", args.server_name);
    let state = ctx.register(ResourceKind::SqlServer, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      fully_qualified_domain_name: state.property_str("fullyQualifiedDomainName"),
      administrator_login: state.property_str("administratorLogin"),
      version: state.property_str("version"),
      state,
    }
  }
}

#[derive(Debug, Clone)]
pub struct DatabaseArgs {
  pub resource_group_name: Input<String>,
  pub server_name: Input<String>,
  /// Service objective, e.g. `"S0"`.
  pub sku_name: Input<String>,
  /// Backend name; defaults to the logical name.
  pub database_name: Option<Input<String>>,
}

/// A database on an Azure SQL server.
#[derive(Debug, Clone)]
pub struct Database {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
}

impl Database {
  pub fn new(ctx: &mut Context, name: &str, args: DatabaseArgs) -> Self {
    let sku = args.sku_name.into_output().map(|sku| json!({ "name": sku }));
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("serverName", args.server_name)
      .set_output("sku", sku)
      .set_opt("databaseName", args.database_name);
    let state = ctx.register(ResourceKind::SqlDatabase, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      state,
    }
  }
}
