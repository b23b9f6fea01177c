//! Configuration model and loading.
//!
//! Configuration is read from JSON, YAML or TOML depending on the file
//! extension. Every section has serde defaults so a partial file is valid;
//! values a feature cannot do without are `Option`s checked by the feature
//! builder, which reports the missing key by name.

use std::fs;
use std::path::Path;

use frederick_template::Ipv4Cidr;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ComposeError, ComposeResult};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> ComposeResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(ComposeError::UnsupportedFormat(format!(
                "'{}' (expected .json, .yaml, .yml or .toml)",
                other
            ))),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrederickConfig {
    /// Stack name and naming prefix.
    pub environment_name: String,
    pub region: String,
    pub network: NetworkConfig,
    pub dns: DnsConfig,
    pub deployment: DeploymentConfig,
    pub features: FeatureFlags,
    pub directory: DirectoryConfig,
    pub database: DatabaseConfig,
    pub compute: ComputeConfig,
    pub containers: ContainersConfig,
    pub storage: StorageConfig,
}

impl Default for FrederickConfig {
    fn default() -> Self {
        Self {
            environment_name: "frederick".to_string(),
            region: "us-east-1".to_string(),
            network: NetworkConfig::default(),
            dns: DnsConfig::default(),
            deployment: DeploymentConfig::default(),
            features: FeatureFlags::default(),
            directory: DirectoryConfig::default(),
            database: DatabaseConfig::default(),
            compute: ComputeConfig::default(),
            containers: ContainersConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cidr_base: String,
    pub cidr_size: u8,
    pub availability_zones: usize,
    /// Prefix length of each carved subnet.
    pub subnet_size: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr_base: "10.0.0.0".to_string(),
            cidr_size: 16,
            availability_zones: 3,
            subnet_size: 24,
        }
    }
}

impl NetworkConfig {
    pub fn cidr(&self) -> ComposeResult<Ipv4Cidr> {
        format!("{}/{}", self.cidr_base, self.cidr_size)
            .parse()
            .map_err(|e| ComposeError::validation("network.cidr_base", format!("{}", e)))
    }

    /// Zone names `<region>a`, `<region>b`, ...
    pub fn zone_names(&self, region: &str) -> Vec<String> {
        (0..self.availability_zones)
            .map(|i| format!("{}{}", region, (b'a' + i as u8) as char))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Private hosted zone, with trailing dot.
    pub hosted_zone: Option<String>,
    pub public_hosted_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Bucket the child documents are uploaded to.
    pub template_bucket: String,
    pub template_prefix: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            template_bucket: "frederick-templates".to_string(),
            template_prefix: "frederick".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub directory: bool,
    pub database: bool,
    pub compute: bool,
    pub containers: bool,
    pub storage: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub simple_ads: Vec<SimpleAdConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleAdConfig {
    pub name: Option<String>,
    /// KMS ciphertext, base64.
    pub password: Option<String>,
    pub shortname: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub instances: Vec<DatabaseInstanceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseInstanceConfig {
    pub name: Option<String>,
    pub engine: Option<String>,
    pub username: Option<String>,
    /// KMS ciphertext, base64.
    pub password: Option<String>,
    /// Allocated storage in GiB.
    pub storage: Option<u32>,
    pub db_instance_type: Option<String>,
    pub multiaz: bool,
    /// Encrypt storage with this key when set.
    pub kms_key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    pub ami_id: Option<String>,
    pub instance_size: Option<String>,
    pub asg_size: Option<u32>,
    pub max_size: u32,
    pub app_port: u16,
    pub public_port: u16,
    pub data_volume_size: u32,
    pub scheduled_actions: Vec<ScheduledActionConfig>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            ami_id: None,
            instance_size: None,
            asg_size: None,
            max_size: 6,
            app_port: 5000,
            public_port: 80,
            data_volume_size: 100,
            scheduled_actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledActionConfig {
    pub name: Option<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_size: u32,
    /// Cron expression.
    pub recurrence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainersConfig {
    pub cluster_name: Option<String>,
    pub services: Vec<ContainerServiceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerServiceConfig {
    pub name: Option<String>,
    pub image: Option<String>,
    pub cpu: u32,
    pub memory: u32,
    pub container_port: u16,
    pub desired_count: u32,
}

impl Default for ContainerServiceConfig {
    fn default() -> Self {
        Self {
            name: None,
            image: None,
            cpu: 256,
            memory: 512,
            container_port: 80,
            desired_count: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub buckets: Vec<BucketConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Fully qualified bucket name, e.g. `assets.example.com`.
    pub name: Option<String>,
    pub access_control: String,
    pub static_site: bool,
    pub route53: bool,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: None,
            access_control: "Private".to_string(),
            static_site: false,
            route53: false,
        }
    }
}

/// Read a required text field, rejecting absent and blank values.
pub fn required<'a>(value: &'a Option<String>, field: &str, context: &str) -> ComposeResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ComposeError::validation(
            context,
            format!("missing required field '{}'", field),
        )),
    }
}

/// Read a required numeric field.
pub fn required_number<T: Copy>(value: Option<T>, field: &str, context: &str) -> ComposeResult<T> {
    value.ok_or_else(|| {
        ComposeError::validation(context, format!("missing required field '{}'", field))
    })
}

impl FrederickConfig {
    /// Load from a file, choosing the parser by extension.
    pub fn from_file(path: &Path) -> ComposeResult<Self> {
        if !path.exists() {
            return Err(ComposeError::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        debug!("Loading {:?} configuration from {}", format, path.display());
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> ComposeResult<Self> {
        let config = match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        Ok(config)
    }

    pub fn to_content(&self, format: ConfigFormat) -> ComposeResult<String> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };
        Ok(content)
    }

    pub fn to_file(&self, path: &Path) -> ComposeResult<()> {
        let content = self.to_content(ConfigFormat::from_path(path)?)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Starting point written for operators who have no configuration yet.
    ///
    /// Only storage is enabled; the other sections hold examples to edit.
    pub fn factory_default() -> Self {
        Self {
            dns: DnsConfig {
                hosted_zone: Some("internal.example.com.".to_string()),
                public_hosted_zone: Some("example.com.".to_string()),
            },
            features: FeatureFlags {
                storage: true,
                ..FeatureFlags::default()
            },
            directory: DirectoryConfig {
                simple_ads: vec![SimpleAdConfig {
                    name: Some("corp".to_string()),
                    password: Some("<kms ciphertext>".to_string()),
                    shortname: Some("CORP".to_string()),
                    size: Some("Small".to_string()),
                }],
            },
            database: DatabaseConfig {
                instances: vec![DatabaseInstanceConfig {
                    name: Some("app".to_string()),
                    engine: Some("postgres".to_string()),
                    username: Some("frederick".to_string()),
                    password: Some("<kms ciphertext>".to_string()),
                    storage: Some(20),
                    db_instance_type: Some("db.t2.micro".to_string()),
                    multiaz: false,
                    kms_key_id: None,
                }],
            },
            compute: ComputeConfig {
                ami_id: Some("ami-0123456789abcdef0".to_string()),
                instance_size: Some("t2.micro".to_string()),
                asg_size: Some(1),
                ..ComputeConfig::default()
            },
            containers: ContainersConfig {
                cluster_name: Some("frederick".to_string()),
                services: vec![ContainerServiceConfig {
                    name: Some("web".to_string()),
                    image: Some("nginx:latest".to_string()),
                    ..ContainerServiceConfig::default()
                }],
            },
            storage: StorageConfig {
                buckets: vec![BucketConfig {
                    name: Some("assets.example.com".to_string()),
                    access_control: "PublicRead".to_string(),
                    static_site: true,
                    route53: false,
                }],
            },
            ..Self::default()
        }
    }

    /// Write [`Self::factory_default`] to `path`.
    pub fn write_default(path: &Path) -> ComposeResult<Self> {
        let config = Self::factory_default();
        config.to_file(path)?;
        info!("Wrote default configuration to {}", path.display());
        Ok(config)
    }

    /// Checks that do not depend on a single feature.
    pub fn validate(&self) -> ComposeResult<()> {
        if self.environment_name.trim().is_empty() {
            return Err(ComposeError::validation(
                "environment_name",
                "environment name must not be empty",
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ComposeError::validation("region", "region must not be empty"));
        }

        let zones = self.network.availability_zones;
        if !(2..=4).contains(&zones) {
            return Err(ComposeError::validation(
                "network.availability_zones",
                format!("expected between 2 and 4 zones, got {}", zones),
            ));
        }

        let cidr = self.network.cidr()?;
        cidr.subnets(self.network.subnet_size, zones * 2)
            .map_err(|e| ComposeError::validation("network.subnet_size", e.to_string()))?;

        let sections = [
            (self.features.directory, self.directory.simple_ads.is_empty(), "directory.simple_ads"),
            (self.features.database, self.database.instances.is_empty(), "database.instances"),
            (self.features.containers, self.containers.services.is_empty(), "containers.services"),
            (self.features.storage, self.storage.buckets.is_empty(), "storage.buckets"),
        ];
        for (enabled, empty, key) in sections {
            if enabled && empty {
                return Err(ComposeError::validation(
                    key,
                    "feature is enabled but has no entries",
                ));
            }
        }

        if self.deployment.template_bucket.trim().is_empty() {
            return Err(ComposeError::validation(
                "deployment.template_bucket",
                "template bucket must not be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate() {
        let config = FrederickConfig::factory_default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.cidr().unwrap().to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
environment_name: staging
features:
  database: true
database:
  instances:
    - name: orders
      username: admin
"#;
        let config = FrederickConfig::parse(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.environment_name, "staging");
        assert_eq!(config.network.availability_zones, 3);
        assert_eq!(config.compute.app_port, 5000);
        assert!(config.database.instances[0].engine.is_none());
    }

    #[test]
    fn test_round_trip_through_each_format() {
        let dir = tempdir().unwrap();
        let config = FrederickConfig::factory_default();

        for name in ["config.json", "config.yaml", "config.toml"] {
            let path = dir.path().join(name);
            config.to_file(&path).unwrap();
            assert_eq!(FrederickConfig::from_file(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_missing_file_and_unknown_extension() {
        let dir = tempdir().unwrap();
        let err = FrederickConfig::from_file(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ComposeError::ConfigNotFound(_)));

        let path = dir.path().join("config.ini");
        std::fs::write(&path, "x").unwrap();
        let err = FrederickConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_zone_count_bounds() {
        let mut config = FrederickConfig::default();
        config.network.availability_zones = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("availability_zones"));
    }

    #[test]
    fn test_enabled_feature_needs_entries() {
        let mut config = FrederickConfig::default();
        config.features.database = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.instances"));
    }

    #[test]
    fn test_required_helper() {
        let context = "database instance 'orders'";
        assert_eq!(required(&Some("postgres".to_string()), "engine", context).unwrap(), "postgres");
        let err = required(&None, "engine", context).unwrap_err();
        assert!(err.to_string().contains("'engine'"));
        assert!(required(&Some("  ".to_string()), "engine", context).is_err());
    }

    #[test]
    fn test_zone_names() {
        let network = NetworkConfig::default();
        assert_eq!(
            network.zone_names("us-east-1"),
            vec!["us-east-1a", "us-east-1b", "us-east-1c"]
        );
    }
}
