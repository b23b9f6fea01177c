//! CLI command definitions.
//!
//! `create` and `deploy` share the composition arguments and differ only in
//! the deployer the composed bundle is handed to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use frederick_compose::{default_root_file_name, ComposeError, Composer, FrederickConfig};
use frederick_deploy::{AwsCli, AwsCliOptions, KmsCliDecryptor};
use tracing::info;

pub mod create;
pub mod deploy;
pub mod init;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "frederick.yaml";

/// Frederick - cloud environment template composer
#[derive(Parser)]
#[command(name = "frederick")]
#[command(version, about = "Frederick - cloud environment template composer")]
#[command(long_about = r#"
Frederick composes a network root template and one nested child template per
enabled feature (directory, database, compute, containers, storage) from a
single configuration file.

COMMANDS:
  init    → Write the default configuration
  create  → Compose and write the templates to a directory
  deploy  → Compose, upload the children and deploy the root stack

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or missing configuration
  3 - Validation failure
  4 - Composition error
  5 - External collaborator failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the default configuration file
    Init(init::InitArgs),

    /// Compose the environment and write its templates
    Create(create::CreateArgs),

    /// Compose the environment and deploy it
    Deploy(deploy::DeployArgs),
}

/// Arguments shared by `create` and `deploy`.
#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    /// Configuration file (.yaml, .yml, .json or .toml)
    #[arg(short, long, env = "FREDERICK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Print the root template to stdout
    #[arg(long)]
    pub debug: bool,

    /// Root template file name (defaults to <environment>.template.json)
    #[arg(short, long)]
    pub template_file: Option<String>,
}

impl ComposeArgs {
    pub fn root_file_name(&self, config: &FrederickConfig) -> String {
        self.template_file
            .clone()
            .unwrap_or_else(|| default_root_file_name(&config.environment_name))
    }
}

/// Load the configuration, or write the default and stop when there is none.
pub fn load_config(path: &Path) -> Result<FrederickConfig> {
    if !path.exists() {
        FrederickConfig::write_default(path)
            .with_context(|| format!("Failed to write default configuration to {}", path.display()))?;
        println!("No configuration found. A default was written to {}.", path.display());
        println!("Edit it for your environment and run the command again.");
        return Err(ComposeError::ConfigNotFound(path.to_path_buf()).into());
    }

    let config = FrederickConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate()?;
    info!(
        "Loaded configuration for {} in {}",
        config.environment_name, config.region
    );
    Ok(config)
}

/// KMS decryption runs even for dry runs; templates need the plaintext.
pub fn decryptor(config: &FrederickConfig, profile: Option<&str>) -> Arc<KmsCliDecryptor> {
    let mut options = AwsCliOptions::new().with_region(config.region.clone());
    if let Some(profile) = profile {
        options = options.with_profile(profile);
    }
    Arc::new(KmsCliDecryptor::new(AwsCli::new(options)))
}

/// Compose the configured environment, printing the root when asked.
pub async fn compose(
    args: &ComposeArgs,
    config: FrederickConfig,
    decryptor: Arc<KmsCliDecryptor>,
) -> Result<Composer> {
    let root_file = args.root_file_name(&config);
    let mut composer = Composer::new(config, decryptor);
    composer.compose().await.context("Composition failed")?;

    if args.debug {
        let bundle = composer.render(&root_file)?;
        println!("{}", bundle.root.body);
    }

    Ok(composer)
}
