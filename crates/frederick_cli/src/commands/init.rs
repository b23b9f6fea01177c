//! Init command - write the default configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use frederick_compose::FrederickConfig;
use tracing::info;

use super::DEFAULT_CONFIG_FILE;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Configuration file to write (.yaml, .yml, .json or .toml)
    #[arg(short, long, env = "FREDERICK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Overwrite an existing configuration
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(args: InitArgs) -> Result<()> {
    let path = args.config_file;

    if path.exists() && !args.force {
        anyhow::bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    info!("Initializing Frederick configuration at {}", path.display());
    let config = FrederickConfig::write_default(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Configuration written to {}", path.display());
    println!();
    println!("Enabled features:");
    for feature in frederick_compose::Feature::all() {
        if feature.enabled(&config.features) {
            println!("  {}", feature);
        }
    }
    println!();
    println!("Next steps:");
    println!("  frederick create --config-file {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("env.json");

        execute(InitArgs {
            config_file: path.clone(),
            force: false,
        })
        .await
        .unwrap();
        assert!(FrederickConfig::from_file(&path).is_ok());

        let again = execute(InitArgs {
            config_file: path.clone(),
            force: false,
        })
        .await;
        assert!(again.is_err());

        execute(InitArgs {
            config_file: path,
            force: true,
        })
        .await
        .unwrap();
    }
}
