//! # frederick_deploy
//!
//! External collaborators used by Frederick once a composition is complete.
//!
//! - **Deployers**: [`FileDeployer`] writes the rendered documents for
//!   inspection (`create`), [`AwsCliDeployer`] uploads child documents and
//!   deploys the root stack through the AWS CLI (`deploy`).
//! - **Secrets**: [`KmsCliDecryptor`] decrypts KMS ciphertext from
//!   configuration.
//! - **Mocks**: [`MockDeployer`] and [`MockDecryptor`] for tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use frederick_deploy::{DeployAction, FileDeployer, StackDeployer};
//! # async fn example(bundle: frederick_template::RenderedBundle) -> Result<(), Box<dyn std::error::Error>> {
//! let deployer = FileDeployer::new("templates");
//! let outcome = deployer.apply(&bundle, DeployAction::Create).await?;
//! println!("Wrote {} files", outcome.documents.len());
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod deployer;
pub mod error;
pub mod files;
pub mod mock;
pub mod secrets;

pub use aws::{AwsCli, AwsCliDeployer, AwsCliOptions};
pub use deployer::{DeployAction, DeployOutcome, StackDeployer};
pub use error::{DeployError, DeployResult};
pub use files::{FileDeployer, MANIFEST_FILE};
pub use mock::{CapturedDeploy, MockDecryptor, MockDeployer};
pub use secrets::{decode_plaintext, KmsCliDecryptor, Secret, SecretDecryptor};
