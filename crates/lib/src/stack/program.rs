use thiserror::Error;

use crate::config::{ConfigError, StackConfig};
use crate::graph::Context;
use crate::package::PackageError;

#[derive(Debug, Error)]
pub enum ProgramError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("invalid program: {0}")]
  Invalid(String),
}

/// Declares the resources and exports of a stack.
///
/// A program runs once per `up` or `preview`. It only declares: nothing is
/// provisioned until the engine walks the resulting graph.
pub trait Program {
  fn declare(self, ctx: &mut Context, config: &StackConfig) -> Result<(), ProgramError>;
}

impl<F> Program for F
where
  F: FnOnce(&mut Context, &StackConfig) -> Result<(), ProgramError>,
{
  fn declare(self, ctx: &mut Context, config: &StackConfig) -> Result<(), ProgramError> {
    self(ctx, config)
  }
}
