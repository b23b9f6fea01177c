//! Secret decryption.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::aws::AwsCli;
use crate::error::{DeployError, DeployResult};

/// A decrypted value. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Turns configuration ciphertext into plaintext.
#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &str) -> DeployResult<Secret>;
}

/// Decrypts with `aws kms decrypt`.
///
/// The ciphertext is the base64 blob produced by `aws kms encrypt`.
#[derive(Debug, Clone)]
pub struct KmsCliDecryptor {
    cli: AwsCli,
}

impl KmsCliDecryptor {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    pub fn decrypt_args(ciphertext: &str) -> Vec<String> {
        vec![
            "kms".to_string(),
            "decrypt".to_string(),
            "--ciphertext-blob".to_string(),
            ciphertext.to_string(),
            "--query".to_string(),
            "Plaintext".to_string(),
            "--output".to_string(),
            "text".to_string(),
        ]
    }
}

/// Decode the base64 `Plaintext` field returned by KMS.
pub fn decode_plaintext(encoded: &str) -> DeployResult<Secret> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DeployError::DecryptFailed(format!("plaintext is not base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| DeployError::DecryptFailed("plaintext is not UTF-8".to_string()))?;
    Ok(Secret::new(text))
}

#[async_trait]
impl SecretDecryptor for KmsCliDecryptor {
    async fn decrypt(&self, ciphertext: &str) -> DeployResult<Secret> {
        if ciphertext.trim().is_empty() {
            return Err(DeployError::DecryptFailed("ciphertext is empty".to_string()));
        }

        debug!("Decrypting secret with KMS");
        let output = self.cli.run(&Self::decrypt_args(ciphertext.trim())).await?;
        decode_plaintext(&output)
    }
}
