//! Error types for template construction.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while building or rendering templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Validation error in {context}: {message}")]
    Validation { context: String, message: String },

    #[error("Duplicate logical id '{logical_id}' in template {template}")]
    DuplicateId { template: String, logical_id: String },

    #[error("Resource '{logical_id}' in template {template} references unknown target '{target}'")]
    UnresolvedReference {
        template: String,
        logical_id: String,
        target: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TemplateError {
    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            context: context.into(),
            message: message.into(),
        }
    }
}
