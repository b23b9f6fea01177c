//! Error types for the deployment collaborators.

use thiserror::Error;

/// Result type alias for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors raised by deployers and secret decryptors.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("AWS CLI not available: {0}")]
    AwsCliNotAvailable(String),

    /// The remote tool exited non-zero; `stderr` is passed through untouched.
    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{deployer} does not support the {action} action")]
    UnsupportedAction { deployer: String, action: String },

    #[error("More than one document would be written to {0}")]
    DuplicateFile(String),

    #[error("Secret decryption failed: {0}")]
    DecryptFailed(String),

    #[error("Template error: {0}")]
    Template(#[from] frederick_template::TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// The message to show an operator: remote stderr as-is when the
    /// provider rejected the call, the error text otherwise.
    pub fn detail(&self) -> String {
        match self {
            DeployError::CommandFailed { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}
