//! AWS CLI wrapper and the `deploy` action.
//!
//! Every call to the provider goes through the `aws` command line tool, so
//! credentials, profiles and regions behave exactly as they do for an
//! operator at a shell. Commands are executed with `tokio::process`; a
//! non-zero exit becomes [`DeployError::CommandFailed`] carrying the tool's
//! stderr as-is.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use frederick_template::{object_key, RenderedBundle};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::deployer::{DeployAction, DeployOutcome, StackDeployer};
use crate::error::{DeployError, DeployResult};
use crate::files::FileDeployer;

/// Capabilities the orchestrator must be granted for IAM resources.
const CAPABILITIES: &[&str] = &["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

/// Options shared by every AWS CLI invocation.
#[derive(Debug, Clone, Default)]
pub struct AwsCliOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// Log commands instead of running them.
    pub dry_run: bool,
}

impl AwsCliOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Thin async wrapper over the `aws` executable.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    options: AwsCliOptions,
}

impl AwsCli {
    pub fn new(options: AwsCliOptions) -> Self {
        Self {
            program: "aws".to_string(),
            options,
        }
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn options(&self) -> &AwsCliOptions {
        &self.options
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Check that the executable can be started.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Arguments with the global `--region`/`--profile` flags appended.
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut full = args.to_vec();
        if let Some(region) = &self.options.region {
            full.push("--region".to_string());
            full.push(region.clone());
        }
        if let Some(profile) = &self.options.profile {
            full.push("--profile".to_string());
            full.push(profile.clone());
        }
        full
    }

    /// Render a command for logs.
    pub fn format_command(&self, args: &[String]) -> String {
        let mut cmd = self.program.clone();
        for arg in self.command_line(args) {
            if arg.contains(' ') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }

    /// Run a command and return its stdout.
    pub async fn run(&self, args: &[String]) -> DeployResult<String> {
        let command = self.format_command(args);

        if self.options.dry_run {
            info!("[dry-run] {}", command);
            return Ok(String::new());
        }

        debug!("Executing: {}", command);
        let output = Command::new(&self.program)
            .args(self.command_line(args))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DeployError::AwsCliNotAvailable(format!(
                    "'{}' was not found on PATH",
                    self.program
                )),
                _ => DeployError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            warn!("Command failed ({}): {}", output.status, command);
            return Err(DeployError::CommandFailed { command, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Applies a bundle as a linked set of stacks.
///
/// Child documents are uploaded to the template bucket first, since the
/// root refers to them by URL, then the root is deployed.
#[derive(Debug, Clone)]
pub struct AwsCliDeployer {
    cli: AwsCli,
    stack_name: String,
    template_bucket: String,
    template_prefix: String,
    staging_dir: PathBuf,
}

impl AwsCliDeployer {
    pub fn new(
        cli: AwsCli,
        stack_name: impl Into<String>,
        template_bucket: impl Into<String>,
        template_prefix: impl Into<String>,
    ) -> Self {
        let stack_name = stack_name.into();
        let staging_dir = std::env::temp_dir().join(format!("frederick-{}", stack_name));
        Self {
            cli,
            stack_name,
            template_bucket: template_bucket.into(),
            template_prefix: template_prefix.into(),
            staging_dir,
        }
    }

    /// Directory the documents are written to before upload.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn upload_args(&self, path: &Path, file_name: &str) -> Vec<String> {
        vec![
            "s3".to_string(),
            "cp".to_string(),
            path.display().to_string(),
            format!(
                "s3://{}/{}",
                self.template_bucket,
                object_key(&self.template_prefix, file_name)
            ),
        ]
    }

    pub fn deploy_args(&self, root_path: &Path) -> Vec<String> {
        let mut args = vec![
            "cloudformation".to_string(),
            "deploy".to_string(),
            "--template-file".to_string(),
            root_path.display().to_string(),
            "--stack-name".to_string(),
            self.stack_name.clone(),
            "--capabilities".to_string(),
        ];
        args.extend(CAPABILITIES.iter().map(|c| c.to_string()));
        args
    }
}

#[async_trait]
impl StackDeployer for AwsCliDeployer {
    fn name(&self) -> &str {
        "aws-cli"
    }

    async fn apply(
        &self,
        bundle: &RenderedBundle,
        action: DeployAction,
    ) -> DeployResult<DeployOutcome> {
        if action != DeployAction::Deploy {
            return Err(DeployError::UnsupportedAction {
                deployer: self.name().to_string(),
                action: action.to_string(),
            });
        }

        if !self.cli.is_dry_run() && !self.cli.is_available().await {
            return Err(DeployError::AwsCliNotAvailable(
                "install the AWS CLI and configure credentials".to_string(),
            ));
        }

        let mut outcome = DeployOutcome::begin(action, self.stack_name.clone());
        FileDeployer::new(&self.staging_dir).write_bundle(bundle)?;

        for child in &bundle.children {
            let path = self.staging_dir.join(&child.file_name);
            let args = self.upload_args(&path, &child.file_name);
            self.cli.run(&args).await?;
            outcome.commands.push(self.cli.format_command(&args));
            outcome.documents.push(path.display().to_string());
        }

        let root_path = self.staging_dir.join(&bundle.root.file_name);
        let args = self.deploy_args(&root_path);
        info!("Deploying stack {}", self.stack_name);
        self.cli.run(&args).await?;
        outcome.commands.push(self.cli.format_command(&args));
        outcome.documents.insert(0, root_path.display().to_string());

        Ok(outcome.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployer() -> AwsCliDeployer {
        let cli = AwsCli::new(
            AwsCliOptions::new()
                .with_region("us-east-1")
                .with_profile("ops")
                .dry_run(),
        );
        AwsCliDeployer::new(cli, "frederick", "my-templates", "frederick")
    }

    #[test]
    fn test_upload_args() {
        let args = deployer().upload_args(Path::new("/tmp/Storage.template.json"), "Storage.template.json");
        assert_eq!(
            args,
            vec![
                "s3",
                "cp",
                "/tmp/Storage.template.json",
                "s3://my-templates/frederick/Storage.template.json"
            ]
        );
    }

    #[test]
    fn test_deploy_args_carry_capabilities() {
        let args = deployer().deploy_args(Path::new("/tmp/frederick.template.json"));
        assert!(args.contains(&"--stack-name".to_string()));
        assert!(args.contains(&"CAPABILITY_NAMED_IAM".to_string()));
    }

    #[test]
    fn test_global_flags_appended() {
        let cli = AwsCli::new(AwsCliOptions::new().with_region("eu-west-1").with_profile("ops"));
        let line = cli.format_command(&["s3".to_string(), "ls".to_string()]);
        assert_eq!(line, "aws s3 ls --region eu-west-1 --profile ops");
    }

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let cli = AwsCli::new(AwsCliOptions::new().dry_run()).with_program("definitely-not-installed");
        let output = cli.run(&["sts".to_string(), "get-caller-identity".to_string()]).await;
        assert_eq!(output.unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let cli = AwsCli::new(AwsCliOptions::new()).with_program("definitely-not-installed");
        let err = cli.run(&["sts".to_string()]).await.unwrap_err();
        assert!(matches!(err, DeployError::AwsCliNotAvailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_passed_through() {
        let cli = AwsCli::new(AwsCliOptions::new()).with_program("sh");
        let args = vec![
            "-c".to_string(),
            "echo 'Stack frederick is in ROLLBACK_COMPLETE state' >&2; exit 255".to_string(),
        ];
        match cli.run(&args).await.unwrap_err() {
            DeployError::CommandFailed { stderr, .. } => {
                assert_eq!(stderr, "Stack frederick is in ROLLBACK_COMPLETE state")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
