//! Deploy command - compose, upload the children and deploy the root stack.

use anyhow::{Context, Result};
use clap::Args;
use frederick_deploy::{AwsCli, AwsCliDeployer, AwsCliOptions};
use tracing::{info, warn};

use super::ComposeArgs;

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    /// AWS CLI profile
    #[arg(short, long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Log the AWS commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let config = super::load_config(&args.compose.config_file)?;
    let root_file = args.compose.root_file_name(&config);
    let decryptor = super::decryptor(&config, args.profile.as_deref());

    let mut options = AwsCliOptions::new().with_region(config.region.clone());
    if let Some(profile) = &args.profile {
        options = options.with_profile(profile.clone());
    }
    if args.dry_run {
        warn!("Dry run: AWS commands are logged, not executed");
        options = options.dry_run();
    }

    let deployer = AwsCliDeployer::new(
        AwsCli::new(options),
        config.environment_name.clone(),
        config.deployment.template_bucket.clone(),
        config.deployment.template_prefix.clone(),
    );

    info!("Deploying {} to {}", config.environment_name, config.region);

    let mut composer = super::compose(&args.compose, config, decryptor).await?;
    let outcome = composer
        .deploy(&deployer, &root_file)
        .await
        .context("Deployment failed")?;

    println!(
        "Stack {} {} in {}ms",
        outcome.target,
        if args.dry_run { "planned" } else { "deployed" },
        outcome.duration_ms
    );
    for command in &outcome.commands {
        println!("  {}", command);
    }

    Ok(())
}
