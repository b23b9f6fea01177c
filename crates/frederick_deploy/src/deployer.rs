//! Stack deployer trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use frederick_template::RenderedBundle;
use serde::{Deserialize, Serialize};

use crate::error::DeployResult;

/// What to do with a rendered bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    /// Serialise the documents for inspection.
    Create,
    /// Apply the documents against the live account.
    Deploy,
}

impl DeployAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployAction::Create => "create",
            DeployAction::Deploy => "deploy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(DeployAction::Create),
            "deploy" => Some(DeployAction::Deploy),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![DeployAction::Create, DeployAction::Deploy]
    }
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of applying a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub deployment_id: String,
    pub action: DeployAction,
    /// Output directory for `create`, stack name for `deploy`.
    pub target: String,
    /// Files written or uploaded, root first.
    pub documents: Vec<String>,
    /// Commands issued against the provider, in order.
    #[serde(default)]
    pub commands: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl DeployOutcome {
    pub(crate) fn begin(action: DeployAction, target: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            deployment_id: format!("frederick-{}", uuid::Uuid::new_v4()),
            action,
            target: target.into(),
            documents: Vec::new(),
            commands: Vec::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.duration_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self
    }
}

/// The external stack deployment collaborator.
///
/// Implementations receive the fully rendered bundle; errors from the
/// provider are surfaced without rewording.
#[async_trait]
pub trait StackDeployer: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Apply the bundle for the given action.
    async fn apply(&self, bundle: &RenderedBundle, action: DeployAction)
        -> DeployResult<DeployOutcome>;
}
