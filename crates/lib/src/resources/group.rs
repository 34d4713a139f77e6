use crate::graph::Context;
use crate::output::{Input, Output};
use crate::resource::{Properties, ResourceKind, ResourceOptions, ResourceState};

#[derive(Debug, Clone, Default)]
pub struct ResourceGroupArgs {
  pub location: Option<Input<String>>,
  /// Backend name; defaults to the logical name.
  pub resource_group_name: Option<Input<String>>,
}

/// A resource group.
#[derive(Debug, Clone)]
pub struct ResourceGroup {
  pub state: Output<ResourceState>,
  pub id: Output<String>,
  pub name: Output<String>,
  pub location: Output<String>,
}

impl ResourceGroup {
  pub fn new(ctx: &mut Context, name: &str, args: ResourceGroupArgs) -> Self {
    Self::with_options(ctx, name, args, ResourceOptions::default())
  }

  pub fn with_options(ctx: &mut Context, name: &str, args: ResourceGroupArgs, options: ResourceOptions) -> Self {
    let properties = Properties::new()
      .set_opt("location", args.location)
      .set_opt("resourceGroupName", args.resource_group_name);
    let state = ctx.register(ResourceKind::ResourceGroup, name, properties, options);

    Self {
      id: state.id(),
      name: state.property_str("name"),
      location: state.property_str("location"),
      state,
    }
  }
}
