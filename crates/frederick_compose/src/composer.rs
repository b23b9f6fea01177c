//! Composition root.
//!
//! The [`Composer`] builds the network root, then every enabled feature in
//! fixed order, attaching each child before the next one is built. The
//! finished tree is rendered and handed to a [`StackDeployer`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use frederick_deploy::{DeployAction, DeployOutcome, SecretDecryptor, StackDeployer};
use frederick_template::RenderedBundle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::FrederickConfig;
use crate::error::{ComposeError, ComposeResult};
use crate::features::{Feature, FeatureContext, SecretStore};
use crate::network::NetworkRoot;
use crate::policy::PolicyRegistry;
use crate::registry::{ChildRegistry, CompositionTree, TemplateLocation};

/// File name of the root document when none is given.
pub fn default_root_file_name(environment: &str) -> String {
    format!("{}.template.json", environment)
}

/// Where a composition run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionState {
    Init,
    BuildingRoot,
    BuildingChild(Feature),
    Attaching(Feature),
    Composed,
    Rendering,
    Deploying,
    Done,
    Failed,
}

impl CompositionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> to` is a legal step. Children only move forward in
    /// feature order, so no state is entered twice.
    pub fn can_transition(&self, to: CompositionState) -> bool {
        use CompositionState::*;

        match (*self, to) {
            (from, Failed) => !from.is_terminal(),
            (Init, BuildingRoot) => true,
            (BuildingRoot, BuildingChild(_)) | (BuildingRoot, Composed) => true,
            (BuildingChild(f), Attaching(g)) => f == g,
            (Attaching(f), BuildingChild(g)) => g > f,
            (Attaching(_), Composed) => true,
            (Composed, Rendering) | (Composed, Deploying) => true,
            (Rendering, Done) | (Deploying, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CompositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::BuildingRoot => write!(f, "building_root"),
            Self::BuildingChild(feature) => write!(f, "building_child({})", feature),
            Self::Attaching(feature) => write!(f, "attaching({})", feature),
            Self::Composed => write!(f, "composed"),
            Self::Rendering => write!(f, "rendering"),
            Self::Deploying => write!(f, "deploying"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Drives one composition from configuration to deployment.
pub struct Composer {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: FrederickConfig,
    policies: PolicyRegistry,
    decryptor: Arc<dyn SecretDecryptor>,
    state: CompositionState,
    history: Vec<CompositionState>,
    tree: Option<CompositionTree>,
}

impl Composer {
    pub fn new(config: FrederickConfig, decryptor: Arc<dyn SecretDecryptor>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            policies: PolicyRegistry::standard(),
            decryptor,
            state: CompositionState::Init,
            history: vec![CompositionState::Init],
            tree: None,
        }
    }

    /// Replace the standard access policies.
    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &FrederickConfig {
        &self.config
    }

    pub fn state(&self) -> CompositionState {
        self.state
    }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> &[CompositionState] {
        &self.history
    }

    pub fn tree(&self) -> Option<&CompositionTree> {
        self.tree.as_ref()
    }

    fn transition(&mut self, to: CompositionState) -> ComposeResult<()> {
        if !self.state.can_transition(to) {
            return Err(ComposeError::InvalidState {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!("Composition {}: {} -> {}", self.id, self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    fn fail(&mut self, error: &ComposeError) {
        error!("Composition {} failed in {}: {}", self.id, self.state, error);
        if !self.state.is_terminal() {
            self.state = CompositionState::Failed;
            self.history.push(CompositionState::Failed);
        }
    }

    /// Build the root and every enabled child.
    ///
    /// Fails with `InvalidState` unless the composer is fresh.
    pub async fn compose(&mut self) -> ComposeResult<&CompositionTree> {
        self.transition(CompositionState::BuildingRoot)?;
        info!(
            "Composing environment {} ({})",
            self.config.environment_name, self.id
        );

        match self.build_tree().await {
            Ok(tree) => {
                self.transition(CompositionState::Composed)?;
                info!(
                    "Composed {} with {} children",
                    tree.root.name(),
                    tree.children.len()
                );
                Ok(&*self.tree.insert(tree))
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn build_tree(&mut self) -> ComposeResult<CompositionTree> {
        self.config.validate()?;
        let cidr = self.config.network.cidr()?;
        let root = NetworkRoot::build(&self.config, cidr)?;
        let mut registry = ChildRegistry::new(
            root.template,
            root.well_known,
            TemplateLocation::from(&self.config.deployment),
        );

        let features: Vec<Feature> = Feature::all()
            .into_iter()
            .filter(|f| f.enabled(&self.config.features))
            .collect();

        for feature in features {
            self.transition(CompositionState::BuildingChild(feature))?;
            let secrets = self.decrypt(feature).await?;
            let child = {
                let ctx = FeatureContext::new(&self.config, cidr, &self.policies, &secrets);
                feature.build(&ctx)?
            };

            self.transition(CompositionState::Attaching(feature))?;
            registry.attach(child)?;
        }

        Ok(registry.into_tree())
    }

    async fn decrypt(&self, feature: Feature) -> ComposeResult<SecretStore> {
        let mut store = SecretStore::new();
        let ciphertexts = feature.secrets(&self.config);
        if !ciphertexts.is_empty() {
            debug!("Decrypting {} secrets for {}", ciphertexts.len(), feature);
        }

        for ciphertext in ciphertexts {
            let secret = self
                .decryptor
                .decrypt(&ciphertext)
                .await
                .map_err(|e| ComposeError::external("decryptor", e))?;
            store.insert(ciphertext, secret);
        }
        Ok(store)
    }

    /// Serialise the composed tree without changing state.
    pub fn render(&self, root_file_name: &str) -> ComposeResult<RenderedBundle> {
        let tree = self.tree.as_ref().ok_or_else(|| ComposeError::InvalidState {
            from: self.state.to_string(),
            to: CompositionState::Rendering.to_string(),
        })?;
        tree.render(&self.config.region, root_file_name)
    }

    /// Render the tree and hand it to `deployer` as a `create`.
    pub async fn create(
        &mut self,
        deployer: &dyn StackDeployer,
        root_file_name: &str,
    ) -> ComposeResult<DeployOutcome> {
        self.transition(CompositionState::Rendering)?;
        let result = self.apply(deployer, DeployAction::Create, root_file_name).await;
        self.finish(result)
    }

    /// Render the tree and hand it to `deployer` as a `deploy`.
    pub async fn deploy(
        &mut self,
        deployer: &dyn StackDeployer,
        root_file_name: &str,
    ) -> ComposeResult<DeployOutcome> {
        self.transition(CompositionState::Deploying)?;
        let result = self.apply(deployer, DeployAction::Deploy, root_file_name).await;
        self.finish(result)
    }

    /// Compose if needed, then create or deploy.
    pub async fn run(
        &mut self,
        action: DeployAction,
        deployer: &dyn StackDeployer,
        root_file_name: &str,
    ) -> ComposeResult<DeployOutcome> {
        if self.state == CompositionState::Init {
            self.compose().await?;
        }
        match action {
            DeployAction::Create => self.create(deployer, root_file_name).await,
            DeployAction::Deploy => self.deploy(deployer, root_file_name).await,
        }
    }

    async fn apply(
        &self,
        deployer: &dyn StackDeployer,
        action: DeployAction,
        root_file_name: &str,
    ) -> ComposeResult<DeployOutcome> {
        let bundle = self.render(root_file_name)?;
        info!(
            "Handing {} documents to {} ({})",
            bundle.documents().count(),
            deployer.name(),
            action
        );
        deployer
            .apply(&bundle, action)
            .await
            .map_err(|e| ComposeError::external(deployer.name(), e))
    }

    fn finish(&mut self, result: ComposeResult<DeployOutcome>) -> ComposeResult<DeployOutcome> {
        match result {
            Ok(outcome) => {
                self.transition(CompositionState::Done)?;
                let elapsed = Utc::now() - self.started_at;
                info!(
                    "Composition {} done in {}ms ({})",
                    self.id,
                    elapsed.num_milliseconds(),
                    outcome.deployment_id
                );
                Ok(outcome)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("id", &self.id)
            .field("environment", &self.config.environment_name)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frederick_deploy::{MockDecryptor, MockDeployer};

    fn storage_config() -> FrederickConfig {
        let mut config = FrederickConfig::factory_default();
        config.environment_name = "dev".to_string();
        config
    }

    #[test]
    fn test_transitions() {
        use CompositionState::*;

        assert!(Init.can_transition(BuildingRoot));
        assert!(BuildingRoot.can_transition(Composed));
        assert!(BuildingChild(Feature::Database).can_transition(Attaching(Feature::Database)));
        assert!(!BuildingChild(Feature::Database).can_transition(Attaching(Feature::Compute)));
        assert!(Attaching(Feature::Database).can_transition(BuildingChild(Feature::Storage)));
        assert!(!Attaching(Feature::Storage).can_transition(BuildingChild(Feature::Database)));
        assert!(Composed.can_transition(Deploying));
        assert!(!Done.can_transition(Failed));
        assert!(!Done.can_transition(BuildingRoot));
        assert!(Rendering.can_transition(Failed));
    }

    #[tokio::test]
    async fn test_compose_then_create() {
        let mut composer = Composer::new(storage_config(), Arc::new(MockDecryptor::new()));
        let deployer = MockDeployer::new();

        composer.compose().await.unwrap();
        assert_eq!(composer.state(), CompositionState::Composed);

        composer.create(&deployer, "dev.template.json").await.unwrap();
        assert_eq!(composer.state(), CompositionState::Done);
        assert_eq!(
            composer.history(),
            &[
                CompositionState::Init,
                CompositionState::BuildingRoot,
                CompositionState::BuildingChild(Feature::Storage),
                CompositionState::Attaching(Feature::Storage),
                CompositionState::Composed,
                CompositionState::Rendering,
                CompositionState::Done,
            ]
        );
        assert_eq!(deployer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_compose_rejected() {
        let mut composer = Composer::new(storage_config(), Arc::new(MockDecryptor::new()));
        composer.compose().await.unwrap();

        let err = composer.compose().await.unwrap_err();
        assert!(matches!(err, ComposeError::InvalidState { .. }));
        assert_eq!(composer.state(), CompositionState::Composed);
    }

    #[tokio::test]
    async fn test_create_before_compose() {
        let mut composer = Composer::new(storage_config(), Arc::new(MockDecryptor::new()));
        let deployer = MockDeployer::new();

        let err = composer.create(&deployer, "dev.template.json").await.unwrap_err();
        assert!(matches!(err, ComposeError::InvalidState { .. }));
        assert!(!deployer.was_called());
    }

    #[tokio::test]
    async fn test_run_composes_first() {
        let mut composer = Composer::new(storage_config(), Arc::new(MockDecryptor::new()));
        let deployer = MockDeployer::new();

        composer
            .run(DeployAction::Deploy, &deployer, &default_root_file_name("dev"))
            .await
            .unwrap();
        assert_eq!(composer.state(), CompositionState::Done);
        assert_eq!(deployer.get_calls()[0].action, DeployAction::Deploy);
    }
}
