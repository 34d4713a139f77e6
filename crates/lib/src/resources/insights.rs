use crate::graph::Context;
use crate::output::{Input, Output};
use crate::resource::{Properties, ResourceKind, ResourceOptions, ResourceState};

use super::{ApplicationType, IngestionMode};

#[derive(Debug, Clone)]
pub struct ComponentArgs {
  pub resource_group_name: Input<String>,
  pub application_type: ApplicationType,
  /// Free-form component kind, usually `"web"`.
  pub kind: Input<String>,
  pub ingestion_mode: Option<IngestionMode>,
  /// Backend name; defaults to the logical name.
  pub resource_name: Option<Input<String>>,
  pub location: Option<Input<String>>,
}

/// An Application Insights component.
#[derive(Debug, Clone)]
pub struct Component {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub instrumentation_key: Output<String>,
  pub connection_string: Output<String>,
}

impl Component {
  pub fn new(ctx: &mut Context, name: &str, args: ComponentArgs) -> Self {
    let properties = Properties::new()
      .set("resourceGroupName", args.resource_group_name)
      .set("applicationType", Input::Value(args.application_type))
      .set("kind", args.kind)
      .set_opt("ingestionMode", args.ingestion_mode.map(Input::Value))
      .set_opt("resourceName", args.resource_name)
      .set_opt("location", args.location);
    let state = ctx.register(ResourceKind::AppInsights, name, properties, ResourceOptions::default());

    Self {
      id: state.id(),
      name: state.property_str("name"),
      instrumentation_key: state.property_str("instrumentationKey"),
      connection_string: state.property_str("connectionString"),
      state,
    }
  }
}
