//! Create command - compose and write the templates for inspection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use frederick_deploy::FileDeployer;
use tracing::info;

use super::ComposeArgs;

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    /// Directory the templates are written to
    #[arg(short, long, default_value = "./templates")]
    pub output_dir: PathBuf,
}

pub async fn execute(args: CreateArgs) -> Result<()> {
    let config = super::load_config(&args.compose.config_file)?;
    let root_file = args.compose.root_file_name(&config);
    let decryptor = super::decryptor(&config, None);

    info!("Creating templates for {} in {}", config.environment_name, args.output_dir.display());

    let mut composer = super::compose(&args.compose, config, decryptor).await?;
    let deployer = FileDeployer::new(&args.output_dir);
    let outcome = composer
        .create(&deployer, &root_file)
        .await
        .context("Failed to write templates")?;

    println!("Templates written to {}", outcome.target);
    for document in &outcome.documents {
        println!("  {}", document);
    }

    Ok(())
}
