//! Simple AD directories with DHCP options pointing at them.

use frederick_template::{sanitize_logical_id, PropertyValue, ResourceBuilder, ResourceKind, Template};
use tracing::debug;

use super::{declare_private_subnets, declare_vpc, Feature, FeatureContext};
use crate::config::required;
use crate::error::ComposeResult;

pub(super) fn build(ctx: &FeatureContext<'_>) -> ComposeResult<Template> {
    let mut template = ctx.template(Feature::Directory, "directory services");
    let vpc = declare_vpc(&mut template)?;
    let subnets = declare_private_subnets(&mut template, 2)?;

    let zone = required(&ctx.config.dns.hosted_zone, "hosted_zone", "dns")?;
    let domain = zone.trim_end_matches('.');

    for (i, ad) in ctx.config.directory.simple_ads.iter().enumerate() {
        let context = format!("directory.simple_ads[{}]", i);
        let name = required(&ad.name, "name", &context)?;
        let ciphertext = required(&ad.password, "password", &context)?;
        let shortname = required(&ad.shortname, "shortname", &context)?;
        let password = ctx.secrets.plaintext(ciphertext, &format!("{}.password", context))?;

        let id = sanitize_logical_id(name);
        debug!("Adding simple AD {} for {}", id, domain);

        let directory = template.add(
            ResourceBuilder::new(ResourceKind::SimpleAd, id.clone())
                .property("CreateAlias", true)
                .property("Name", domain)
                .property("Password", password)
                .property("ShortName", shortname)
                .property("Size", ad.size.as_deref().unwrap_or("Small"))
                .property(
                    "VpcSettings",
                    PropertyValue::map([
                        (
                            "SubnetIds",
                            PropertyValue::list(subnets.iter().map(|s| s.to_ref())),
                        ),
                        ("VpcId", vpc.to_ref()),
                    ]),
                )
                .build()?,
        )?;

        let dhcp = template.add(
            ResourceBuilder::new(ResourceKind::DhcpOptions, format!("{}dhcpopts", id))
                .property("DomainName", domain)
                .property("DomainNameServers", directory.attr("DnsIpAddresses"))
                .property("NetbiosNameServers", directory.attr("DnsIpAddresses"))
                .build()?,
        )?;

        template.add(
            ResourceBuilder::new(
                ResourceKind::VpcDhcpOptionsAssociation,
                format!("{}dhcpoptsassociation", id),
            )
            .property("DhcpOptionsId", dhcp.to_ref())
            .property("VpcId", vpc.to_ref())
            .build()?,
        )?;
    }

    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrederickConfig, SimpleAdConfig};
    use crate::error::ComposeError;
    use crate::features::test_support::context;
    use crate::features::SecretStore;
    use crate::policy::PolicyRegistry;
    use frederick_deploy::Secret;

    fn config() -> FrederickConfig {
        let mut config = FrederickConfig::default();
        config.dns.hosted_zone = Some("corp.example.com.".to_string());
        config.directory.simple_ads.push(SimpleAdConfig {
            name: Some("corp-ad".to_string()),
            password: Some("AQICAH".to_string()),
            shortname: Some("CORP".to_string()),
            size: None,
        });
        config
    }

    #[test]
    fn test_directory_resources() {
        let config = config();
        let policies = PolicyRegistry::standard();
        let mut secrets = SecretStore::new();
        secrets.insert("AQICAH", Secret::new("s3cret"));

        let template = build(&context(&config, &policies, &secrets)).unwrap();
        let ad = template.resource("corpad").unwrap();

        assert_eq!(ad.property("Name").unwrap().as_str(), Some("corp.example.com"));
        assert_eq!(ad.property("Password").unwrap().as_str(), Some("s3cret"));
        assert_eq!(ad.property("Size").unwrap().as_str(), Some("Small"));
        assert_eq!(
            ad.property("VpcSettings").unwrap().to_json()["SubnetIds"],
            serde_json::json!([{"Ref": "privateAZ0"}, {"Ref": "privateAZ1"}])
        );

        let dhcp = template.resource("corpaddhcpopts").unwrap();
        assert_eq!(
            dhcp.property("DomainNameServers").unwrap().to_json(),
            serde_json::json!({"Fn::GetAtt": ["corpad", "DnsIpAddresses"]})
        );
        assert!(template.resource("corpaddhcpoptsassociation").is_some());
    }

    #[test]
    fn test_missing_hosted_zone() {
        let mut config = config();
        config.dns.hosted_zone = None;
        let policies = PolicyRegistry::standard();
        let secrets = SecretStore::new();

        let err = build(&context(&config, &policies, &secrets)).unwrap_err();
        assert!(matches!(err, ComposeError::Validation { ref message, .. } if message.contains("hosted_zone")));
    }
}
