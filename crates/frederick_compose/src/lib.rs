//! # frederick_compose
//!
//! Composition of a Frederick environment.
//!
//! Configuration selects which features an environment carries. The
//! [`Composer`] builds the network root, then one child template per
//! enabled feature, and attaches each child to the root as a nested stack
//! whose parameters are bound to the root's outputs.
//!
//! # Architecture
//!
//! - **Config**: [`FrederickConfig`], loaded from JSON, YAML or TOML
//! - **Network**: [`NetworkRoot`], the VPC and everything children share
//! - **Features**: [`Feature`] builders for directory, database, compute,
//!   containers and storage
//! - **Registry**: [`ChildRegistry`] binds child parameters and embeds children
//! - **Composer**: the state machine from configuration to deployment
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frederick_compose::{default_root_file_name, Composer, FrederickConfig};
//! use frederick_deploy::{FileDeployer, MockDecryptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FrederickConfig::from_file("frederick.yaml".as_ref())?;
//! let root_file = default_root_file_name(&config.environment_name);
//!
//! let mut composer = Composer::new(config, Arc::new(MockDecryptor::new()));
//! composer.compose().await?;
//! composer.create(&FileDeployer::new("templates"), &root_file).await?;
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod config;
pub mod error;
pub mod features;
pub mod network;
pub mod policy;
pub mod registry;
pub mod resources;

pub use composer::{default_root_file_name, Composer, CompositionState};
pub use config::{
    BucketConfig, ComputeConfig, ConfigFormat, ContainerServiceConfig, ContainersConfig,
    DatabaseConfig, DatabaseInstanceConfig, DeploymentConfig, DirectoryConfig, DnsConfig,
    FeatureFlags, FrederickConfig, NetworkConfig, ScheduledActionConfig, SimpleAdConfig,
    StorageConfig,
};
pub use error::{ComposeError, ComposeResult, ErrorKind};
pub use features::{Feature, FeatureContext, SecretStore};
pub use network::{NetworkRoot, COMMON_SECURITY_GROUP, VPC_ID};
pub use policy::{AccessPolicy, PolicyRegistry};
pub use registry::{
    AttachedChild, BindingSource, ChildRegistry, CompositionTree, ParameterBinding,
    TemplateLocation, WellKnownRefs,
};
