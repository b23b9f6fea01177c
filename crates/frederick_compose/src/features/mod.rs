//! Feature builders.
//!
//! Each feature produces one child template from configuration. Children
//! only declare parameters; the registry binds them to the root.

mod compute;
mod containers;
mod database;
mod directory;
mod storage;

pub use compute::AMI_PARAMETER;
pub use database::{engine_profile, record_name, EngineProfile};
pub use storage::{alias_zone, is_valid_bucket_name};

use std::collections::HashMap;
use std::fmt;

use frederick_deploy::Secret;
use frederick_template::{Ipv4Cidr, ParameterSpec, ParameterType, Reference, Template};

use crate::config::{FeatureFlags, FrederickConfig};
use crate::error::{ComposeError, ComposeResult};
use crate::network::{private_subnet_output, public_subnet_output, COMMON_SECURITY_GROUP, VPC_ID};
use crate::policy::PolicyRegistry;

/// A child template the composer can build.
///
/// Variants are declared in attachment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Directory,
    Database,
    Compute,
    Containers,
    Storage,
}

impl Feature {
    /// Attachment order: identity first, storage last.
    pub fn all() -> Vec<Feature> {
        vec![
            Feature::Directory,
            Feature::Database,
            Feature::Compute,
            Feature::Containers,
            Feature::Storage,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Directory => "directory",
            Feature::Database => "database",
            Feature::Compute => "compute",
            Feature::Containers => "containers",
            Feature::Storage => "storage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|f| f.as_str() == s)
    }

    /// Name of the child template, also its namespace.
    pub fn template_name(&self) -> &'static str {
        match self {
            Feature::Directory => "Directory",
            Feature::Database => "Database",
            Feature::Compute => "Compute",
            Feature::Containers => "Containers",
            Feature::Storage => "Storage",
        }
    }

    pub fn enabled(&self, flags: &FeatureFlags) -> bool {
        match self {
            Feature::Directory => flags.directory,
            Feature::Database => flags.database,
            Feature::Compute => flags.compute,
            Feature::Containers => flags.containers,
            Feature::Storage => flags.storage,
        }
    }

    /// Ciphertexts this feature needs decrypted before it can build.
    pub fn secrets(&self, config: &FrederickConfig) -> Vec<String> {
        let values: Vec<&Option<String>> = match self {
            Feature::Directory => config.directory.simple_ads.iter().map(|ad| &ad.password).collect(),
            Feature::Database => config.database.instances.iter().map(|db| &db.password).collect(),
            Feature::Compute | Feature::Containers | Feature::Storage => Vec::new(),
        };

        let mut ciphertexts: Vec<String> = values
            .into_iter()
            .filter_map(|v| v.as_deref().map(str::trim))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        ciphertexts.dedup();
        ciphertexts
    }

    pub fn build(&self, ctx: &FeatureContext<'_>) -> ComposeResult<Template> {
        let template = match self {
            Feature::Directory => directory::build(ctx)?,
            Feature::Database => database::build(ctx)?,
            Feature::Compute => compute::build(ctx)?,
            Feature::Containers => containers::build(ctx)?,
            Feature::Storage => storage::build(ctx)?,
        };
        Ok(template)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decrypted secrets keyed by ciphertext.
#[derive(Debug, Default)]
pub struct SecretStore {
    secrets: HashMap<String, Secret>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ciphertext: impl Into<String>, secret: Secret) {
        self.secrets.insert(ciphertext.into(), secret);
    }

    pub fn contains(&self, ciphertext: &str) -> bool {
        self.secrets.contains_key(ciphertext.trim())
    }

    /// Plaintext for `ciphertext`; `field` names the configuration key.
    pub fn plaintext(&self, ciphertext: &str, field: &str) -> ComposeResult<&str> {
        self.secrets
            .get(ciphertext.trim())
            .map(Secret::expose)
            .ok_or_else(|| ComposeError::validation(field, "secret was not decrypted"))
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

/// Everything a feature builder reads.
pub struct FeatureContext<'a> {
    pub config: &'a FrederickConfig,
    pub cidr: Ipv4Cidr,
    pub policies: &'a PolicyRegistry,
    pub secrets: &'a SecretStore,
}

impl<'a> FeatureContext<'a> {
    pub fn new(
        config: &'a FrederickConfig,
        cidr: Ipv4Cidr,
        policies: &'a PolicyRegistry,
        secrets: &'a SecretStore,
    ) -> Self {
        Self {
            config,
            cidr,
            policies,
            secrets,
        }
    }

    pub fn zone_count(&self) -> usize {
        self.config.network.availability_zones
    }

    fn template(&self, feature: Feature, description: &str) -> Template {
        Template::new(feature.template_name()).with_description(format!(
            "{} {}",
            self.config.environment_name, description
        ))
    }
}

fn declare_vpc(template: &mut Template) -> ComposeResult<Reference> {
    Ok(template.declare_parameter(
        ParameterSpec::new(VPC_ID, ParameterType::VpcId).with_description("VPC of the environment"),
    )?)
}

fn declare_public_subnets(template: &mut Template, count: usize) -> ComposeResult<Vec<Reference>> {
    (0..count)
        .map(|i| {
            Ok(template.declare_parameter(
                ParameterSpec::new(public_subnet_output(i), ParameterType::SubnetId)
                    .with_description(format!("Public subnet {}", i)),
            )?)
        })
        .collect()
}

fn declare_private_subnets(template: &mut Template, count: usize) -> ComposeResult<Vec<Reference>> {
    (0..count)
        .map(|i| {
            Ok(template.declare_parameter(
                ParameterSpec::new(private_subnet_output(i), ParameterType::SubnetId)
                    .with_description(format!("Private subnet {}", i)),
            )?)
        })
        .collect()
}

fn declare_common_security_group(template: &mut Template) -> ComposeResult<Reference> {
    Ok(template.declare_parameter(
        ParameterSpec::new(COMMON_SECURITY_GROUP, ParameterType::SecurityGroupId)
            .with_description("Security group shared by the environment"),
    )?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn context<'a>(
        config: &'a FrederickConfig,
        policies: &'a PolicyRegistry,
        secrets: &'a SecretStore,
    ) -> FeatureContext<'a> {
        FeatureContext::new(config, config.network.cidr().unwrap(), policies, secrets)
    }
}
