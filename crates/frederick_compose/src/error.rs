//! Error types for composition.

use std::path::PathBuf;

use frederick_deploy::DeployError;
use frederick_template::TemplateError;
use thiserror::Error;

/// Result type alias for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that abort a composition run.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Validation error in {context}: {message}")]
    Validation { context: String, message: String },

    #[error("Duplicate id '{logical_id}' in {template}")]
    DuplicateId { template: String, logical_id: String },

    #[error("Child template {child} has no binding for parameter '{parameter}'")]
    UnresolvedParameter { child: String, parameter: String },

    #[error("Resource '{logical_id}' in template {child} references '{target}', which the template does not declare")]
    CrossTemplateReference {
        child: String,
        logical_id: String,
        target: String,
    },

    /// A collaborator failed; `message` is its own error text.
    #[error("{collaborator} failed: {message}")]
    ExternalDependency { collaborator: String, message: String },

    #[error("Invalid composition state: cannot move from {from} to {to}")]
    InvalidState { from: String, to: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

/// Coarse classification used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Validation,
    Composition,
    External,
    Io,
}

impl ComposeError {
    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Wrap a collaborator failure, keeping the remote message intact.
    pub fn external(collaborator: impl Into<String>, error: DeployError) -> Self {
        Self::ExternalDependency {
            collaborator: collaborator.into(),
            message: error.detail(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::DuplicateId { .. }
            | Self::UnresolvedParameter { .. }
            | Self::CrossTemplateReference { .. }
            | Self::InvalidState { .. } => ErrorKind::Composition,
            Self::ExternalDependency { .. } => ErrorKind::External,
            Self::ConfigNotFound(_)
            | Self::UnsupportedFormat(_)
            | Self::Yaml(_)
            | Self::TomlParse(_)
            | Self::TomlWrite(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }
}

impl From<TemplateError> for ComposeError {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::Validation { context, message } => Self::Validation { context, message },
            TemplateError::DuplicateId {
                template,
                logical_id,
            } => Self::DuplicateId {
                template,
                logical_id,
            },
            TemplateError::UnresolvedReference {
                template,
                logical_id,
                target,
            } => Self::CrossTemplateReference {
                child: template,
                logical_id,
                target,
            },
            TemplateError::Serialization(e) => Self::Json(e),
        }
    }
}
