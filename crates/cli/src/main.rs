mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use appstack_lib::package::DEFAULT_PACKAGE_DIR;

use crate::cmd::{cmd_config_get, cmd_config_set, cmd_init, cmd_outputs, cmd_preview, cmd_up};

/// appstack - declarative App Service deployments
#[derive(Parser)]
#[command(name = "appstack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project directory holding the per-stack config files
  #[arg(long, global = true, default_value = ".")]
  project_dir: PathBuf,

  /// Stack to operate on
  #[arg(short, long, global = true, default_value = "dev")]
  stack: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create a stack and its config file
  Init {
    /// Location for the stack's resources (e.g. uksouth)
    #[arg(long)]
    location: Option<String>,
  },

  /// Read or write stack configuration
  Config {
    #[command(subcommand)]
    action: ConfigCommand,
  },

  /// Show what `up` would do, without provisioning
  Preview {
    /// Directory to package and deploy (relative to the project directory)
    #[arg(long, default_value = DEFAULT_PACKAGE_DIR)]
    package_dir: PathBuf,
  },

  /// Provision the stack
  Up {
    /// Directory to package and deploy (relative to the project directory)
    #[arg(long, default_value = DEFAULT_PACKAGE_DIR)]
    package_dir: PathBuf,

    /// Maximum number of concurrent backend calls
    #[arg(long)]
    parallelism: Option<usize>,
  },

  /// Show the exports of the last `up`
  Outputs {
    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Show secret values in plain text
    #[arg(long)]
    show_secrets: bool,
  },
}

#[derive(Subcommand)]
enum ConfigCommand {
  /// Set a configuration value
  Set {
    key: String,
    value: String,

    /// Store the value as a secret
    #[arg(long)]
    secret: bool,
  },

  /// Print a configuration value
  Get {
    key: String,

    /// Print secret values in plain text
    #[arg(long)]
    show_secrets: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  // -v wins over RUST_LOG; logs go to stderr so stdout stays parseable
  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let project_dir = cli.project_dir;
  let stack = cli.stack;

  match cli.command {
    Commands::Init { location } => cmd_init(&project_dir, &stack, location.as_deref()),
    Commands::Config { action } => match action {
      ConfigCommand::Set { key, value, secret } => cmd_config_set(&project_dir, &stack, &key, &value, secret),
      ConfigCommand::Get { key, show_secrets } => cmd_config_get(&project_dir, &stack, &key, show_secrets),
    },
    Commands::Preview { package_dir } => cmd_preview(&project_dir, &stack, &package_dir),
    Commands::Up {
      package_dir,
      parallelism,
    } => cmd_up(&project_dir, &stack, &package_dir, parallelism),
    Commands::Outputs { json, show_secrets } => cmd_outputs(&project_dir, &stack, json, show_secrets),
  }
}
