//! S3 buckets, optionally public, website hosting and DNS aliased.

use std::sync::OnceLock;

use frederick_template::{sanitize_logical_id, PropertyValue, ResourceBuilder, ResourceKind, Template};
use regex::Regex;
use tracing::{debug, warn};

use super::{Feature, FeatureContext};
use crate::config::{required, BucketConfig};
use crate::error::{ComposeError, ComposeResult};
use crate::resources::{dns_alias, website_endpoint};

const PUBLIC_READ: &str = "PublicRead";

fn bucket_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("bucket name pattern is valid")
    })
}

pub fn is_valid_bucket_name(name: &str) -> bool {
    bucket_name_pattern().is_match(name)
}

/// Public zone a bucket alias goes into.
///
/// Production environments publish each bucket under its own zone.
pub fn alias_zone(bucket: &str, hosted_zone: Option<&str>, public_zone: Option<&str>) -> Option<String> {
    if hosted_zone.is_some_and(|z| z.contains(".prod")) {
        Some(format!("{}.", bucket))
    } else {
        public_zone.map(str::to_string)
    }
}

pub(super) fn build(ctx: &FeatureContext<'_>) -> ComposeResult<Template> {
    let mut template = ctx.template(Feature::Storage, "storage buckets");

    for (i, bucket) in ctx.config.storage.buckets.iter().enumerate() {
        add_bucket(ctx, &mut template, bucket, &format!("storage.buckets[{}]", i))?;
    }

    Ok(template)
}

fn add_bucket(
    ctx: &FeatureContext<'_>,
    template: &mut Template,
    config: &BucketConfig,
    context: &str,
) -> ComposeResult<()> {
    let name = required(&config.name, "name", context)?;
    if !is_valid_bucket_name(name) {
        return Err(ComposeError::validation(
            format!("{}.name", context),
            format!("'{}' is not a valid bucket name", name),
        ));
    }
    let id = sanitize_logical_id(name);

    let mut bucket = ResourceBuilder::new(ResourceKind::Bucket, format!("{}Bucket", id))
        .property("BucketName", name)
        .property("AccessControl", config.access_control.as_str());
    if config.static_site {
        bucket = bucket.property(
            "WebsiteConfiguration",
            PropertyValue::map([("IndexDocument", PropertyValue::from("index.html"))]),
        );
    }
    let bucket = template.add(bucket.build()?)?;

    if config.access_control == PUBLIC_READ {
        warn!("Bucket {} is publicly readable", name);
        let statement = PropertyValue::map([
            ("Sid", PropertyValue::from("PublicReadForGetBucketObjects")),
            ("Effect", PropertyValue::from("Allow")),
            ("Principal", PropertyValue::from("*")),
            ("Action", PropertyValue::from("s3:GetObject")),
            ("Resource", PropertyValue::from(format!("arn:aws:s3:::{}/*", name))),
        ]);
        template.add(
            ResourceBuilder::new(ResourceKind::BucketPolicy, format!("{}BucketPolicy", id))
                .property("Bucket", bucket.to_ref())
                .property(
                    "PolicyDocument",
                    PropertyValue::map([("Statement", PropertyValue::list([statement]))]),
                )
                .build()?,
        )?;
    }

    if config.route53 {
        let dns = &ctx.config.dns;
        let zone = alias_zone(name, dns.hosted_zone.as_deref(), dns.public_hosted_zone.as_deref())
            .ok_or_else(|| {
                ComposeError::validation("dns", "missing required field 'public_hosted_zone'")
            })?;
        let (endpoint, zone_id) = website_endpoint(&ctx.config.region)?;
        debug!("Aliasing {} into {} via {}", name, zone, endpoint);

        template.add(dns_alias(
            &format!("{}AliasRecordSetGroup{}", id, sanitize_logical_id(&zone)),
            name,
            endpoint,
            zone_id,
            &zone,
        )?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrederickConfig;
    use crate::features::test_support::context;
    use crate::features::SecretStore;
    use crate::policy::PolicyRegistry;

    fn config(bucket: BucketConfig) -> FrederickConfig {
        let mut config = FrederickConfig::default();
        config.storage.buckets.push(bucket);
        config
    }

    fn build_with(config: &FrederickConfig) -> ComposeResult<Template> {
        let policies = PolicyRegistry::standard();
        let secrets = SecretStore::new();
        build(&context(config, &policies, &secrets))
    }

    fn bucket(name: &str) -> BucketConfig {
        BucketConfig {
            name: Some(name.to_string()),
            ..BucketConfig::default()
        }
    }

    #[test]
    fn test_private_bucket() {
        let template = build_with(&config(bucket("logs.example.com"))).unwrap();
        assert_eq!(template.resources().len(), 1);

        let resource = template.resource("logsexamplecomBucket").unwrap();
        assert_eq!(resource.property("AccessControl").unwrap().as_str(), Some("Private"));
        assert!(resource.property("WebsiteConfiguration").is_none());
    }

    #[test]
    fn test_static_site_with_alias() {
        let mut config = config(BucketConfig {
            access_control: "PublicRead".to_string(),
            static_site: true,
            route53: true,
            ..bucket("www.example.com")
        });
        config.dns.public_hosted_zone = Some("example.com.".to_string());

        let template = build_with(&config).unwrap();
        let ids: Vec<&str> = template.resources().iter().map(|r| r.logical_id()).collect();
        assert_eq!(
            ids,
            vec![
                "wwwexamplecomBucket",
                "wwwexamplecomBucketPolicy",
                "wwwexamplecomAliasRecordSetGroupexamplecom",
            ]
        );

        let alias = template.resource("wwwexamplecomAliasRecordSetGroupexamplecom").unwrap();
        let sets = alias.property("RecordSets").unwrap().to_json();
        assert_eq!(sets[0]["AliasTarget"]["DNSName"], "s3-website-us-east-1.amazonaws.com");
        assert_eq!(sets[0]["AliasTarget"]["HostedZoneId"], "Z3AQBSTGFYJSTF");
    }

    #[test]
    fn test_route53_requires_public_zone() {
        let config = config(BucketConfig {
            route53: true,
            ..bucket("www.example.com")
        });
        match build_with(&config).unwrap_err() {
            ComposeError::Validation { message, .. } => assert!(message.contains("public_hosted_zone")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_alias_zone() {
        assert_eq!(
            alias_zone("files.example.com", Some("internal.prod.example.com."), Some("example.com.")),
            Some("files.example.com.".to_string())
        );
        assert_eq!(
            alias_zone("files.example.com", Some("internal.dev.example.com."), Some("example.com.")),
            Some("example.com.".to_string())
        );
        assert_eq!(alias_zone("files.example.com", None, None), None);
    }

    #[test]
    fn test_bucket_names() {
        assert!(is_valid_bucket_name("assets.example.com"));
        assert!(!is_valid_bucket_name("Assets"));
        assert!(!is_valid_bucket_name("-bad"));
        assert!(build_with(&config(bucket("UPPER_case"))).is_err());
    }
}
