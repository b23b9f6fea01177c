//! Mock collaborators for testing.
//!
//! Both mocks capture every call and can be told to fail, so callers can
//! verify ordering and error propagation without touching an AWS account.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use frederick_template::RenderedBundle;
use parking_lot::RwLock;

use crate::deployer::{DeployAction, DeployOutcome, StackDeployer};
use crate::error::{DeployError, DeployResult};
use crate::secrets::{Secret, SecretDecryptor};

/// Captured deployer call.
#[derive(Debug, Clone)]
pub struct CapturedDeploy {
    pub action: DeployAction,
    pub environment: String,
    pub root: String,
    pub root_body: String,
    /// Child document names in bundle order.
    pub children: Vec<String>,
}

/// Mock stack deployer.
#[derive(Clone, Default)]
pub struct MockDeployer {
    captured_calls: Arc<RwLock<Vec<CapturedDeploy>>>,
    /// Remote error text to fail with.
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with a `CommandFailed` carrying this stderr.
    pub fn simulate_failure(self, stderr: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(stderr.into());
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedDeploy> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }
}

#[async_trait]
impl StackDeployer for MockDeployer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn apply(
        &self,
        bundle: &RenderedBundle,
        action: DeployAction,
    ) -> DeployResult<DeployOutcome> {
        self.captured_calls.write().push(CapturedDeploy {
            action,
            environment: bundle.environment.clone(),
            root: bundle.root.name.clone(),
            root_body: bundle.root.body.clone(),
            children: bundle.children.iter().map(|c| c.name.clone()).collect(),
        });

        if let Some(stderr) = self.simulate_failure.read().clone() {
            return Err(DeployError::CommandFailed {
                command: format!("mock {}", action),
                stderr,
            });
        }

        let mut outcome = DeployOutcome::begin(action, bundle.environment.clone());
        outcome.documents = bundle.documents().map(|d| d.file_name.clone()).collect();
        Ok(outcome.finish())
    }
}

/// Mock secret decryptor.
///
/// Known ciphertexts map to configured plaintexts; anything else decrypts to
/// `plain:<ciphertext>`.
#[derive(Clone, Default)]
pub struct MockDecryptor {
    plaintexts: Arc<RwLock<HashMap<String, String>>>,
    captured_calls: Arc<RwLock<Vec<String>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockDecryptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plaintext(self, ciphertext: impl Into<String>, plaintext: impl Into<String>) -> Self {
        self.plaintexts.write().insert(ciphertext.into(), plaintext.into());
        self
    }

    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Ciphertexts received, in order.
    pub fn get_calls(&self) -> Vec<String> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }
}

#[async_trait]
impl SecretDecryptor for MockDecryptor {
    async fn decrypt(&self, ciphertext: &str) -> DeployResult<Secret> {
        self.captured_calls.write().push(ciphertext.to_string());

        if let Some(message) = self.simulate_failure.read().clone() {
            return Err(DeployError::DecryptFailed(message));
        }

        let plaintext = self
            .plaintexts
            .read()
            .get(ciphertext)
            .cloned()
            .unwrap_or_else(|| format!("plain:{}", ciphertext));
        Ok(Secret::new(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_decryptor_lookup() {
        let decryptor = MockDecryptor::new().with_plaintext("AQICAH", "s3cret");

        assert_eq!(decryptor.decrypt("AQICAH").await.unwrap().expose(), "s3cret");
        assert_eq!(decryptor.decrypt("other").await.unwrap().expose(), "plain:other");
        assert_eq!(decryptor.get_calls(), vec!["AQICAH", "other"]);
    }

    #[tokio::test]
    async fn test_mock_decryptor_failure() {
        let decryptor = MockDecryptor::new().simulate_failure("AccessDeniedException");
        let err = decryptor.decrypt("AQICAH").await.unwrap_err();
        assert!(err.to_string().contains("AccessDeniedException"));
        assert_eq!(decryptor.call_count(), 1);
    }
}
