//! Resource constructors shared by the feature builders.

use frederick_template::{
    PropertyValue, ResourceBuilder, ResourceDescription, ResourceKind, TemplateResult,
};

use crate::error::{ComposeError, ComposeResult};
use crate::policy::AccessPolicy;

/// Hosted zone and endpoint of the S3 website service per region.
const WEBSITE_ENDPOINTS: &[(&str, &str, &str)] = &[
    ("us-east-1", "s3-website-us-east-1.amazonaws.com", "Z3AQBSTGFYJSTF"),
    ("us-west-1", "s3-website-us-west-1.amazonaws.com", "Z2F56UZL2M1ACD"),
    ("us-west-2", "s3-website-us-west-2.amazonaws.com", "Z3BJ6K6RIION7M"),
    ("eu-west-1", "s3-website-eu-west-1.amazonaws.com", "Z1BKCTXD74EZPE"),
];

/// S3 website endpoint `(dns name, hosted zone id)` for a region.
pub fn website_endpoint(region: &str) -> ComposeResult<(&'static str, &'static str)> {
    WEBSITE_ENDPOINTS
        .iter()
        .find(|(r, _, _)| *r == region)
        .map(|(_, dns, zone)| (*dns, *zone))
        .ok_or_else(|| {
            ComposeError::validation(
                "region",
                format!("no S3 website endpoint known for region '{}'", region),
            )
        })
}

/// One security group rule from a CIDR range.
pub fn cidr_rule(protocol: &str, from_port: u16, to_port: u16, cidr: &str) -> PropertyValue {
    PropertyValue::map([
        ("IpProtocol", PropertyValue::from(protocol)),
        ("FromPort", PropertyValue::from(from_port)),
        ("ToPort", PropertyValue::from(to_port)),
        ("CidrIp", PropertyValue::from(cidr)),
    ])
}

/// Security group admitting `ports` over tcp from `cidr`.
pub fn security_group_with_cidr(
    logical_id: &str,
    description: &str,
    vpc: PropertyValue,
    cidr: &str,
    ports: &[u16],
) -> TemplateResult<ResourceDescription> {
    let rules = ports.iter().map(|p| cidr_rule("tcp", *p, *p, cidr));

    ResourceBuilder::new(ResourceKind::SecurityGroup, logical_id)
        .property("GroupDescription", description)
        .property("VpcId", vpc)
        .property("SecurityGroupIngress", PropertyValue::list(rules))
        .build()
}

/// Alias `A` record pointing `name` at a fixed target.
pub fn dns_alias(
    logical_id: &str,
    name: &str,
    dns_name: &str,
    zone_id: &str,
    zone_name: &str,
) -> TemplateResult<ResourceDescription> {
    let record = PropertyValue::map([
        ("Name", PropertyValue::from(name)),
        ("Type", PropertyValue::from("A")),
        (
            "AliasTarget",
            PropertyValue::map([
                ("HostedZoneId", PropertyValue::from(zone_id)),
                ("DNSName", PropertyValue::from(dns_name)),
            ]),
        ),
    ]);

    ResourceBuilder::new(ResourceKind::RecordSetGroup, logical_id)
        .property("HostedZoneName", zone_name)
        .property("RecordSets", PropertyValue::list([record]))
        .build()
}

/// `CNAME` record with a one minute TTL.
pub fn cname_record(
    logical_id: &str,
    name: &str,
    target: PropertyValue,
    zone_name: &str,
) -> TemplateResult<ResourceDescription> {
    let record = PropertyValue::map([
        ("Name", PropertyValue::from(name)),
        ("Type", PropertyValue::from("CNAME")),
        ("TTL", PropertyValue::from("60")),
        ("ResourceRecords", PropertyValue::list([target])),
    ]);

    ResourceBuilder::new(ResourceKind::RecordSetGroup, logical_id)
        .property("HostedZoneName", zone_name)
        .property("RecordSets", PropertyValue::list([record]))
        .build()
}

/// Role assumable by `services` with inline policies.
pub fn role(
    logical_id: &str,
    services: &[&str],
    policies: &[&AccessPolicy],
) -> TemplateResult<ResourceDescription> {
    let services = PropertyValue::list(services.iter().map(|s| PropertyValue::from(*s)));
    let assume = PropertyValue::map([(
        "Statement",
        PropertyValue::list([PropertyValue::map([
            ("Effect", PropertyValue::from("Allow")),
            ("Principal", PropertyValue::map([("Service", services)])),
            ("Action", PropertyValue::list([PropertyValue::from("sts:AssumeRole")])),
        ])]),
    )]);

    ResourceBuilder::new(ResourceKind::Role, logical_id)
        .property("AssumeRolePolicyDocument", assume)
        .property("Path", "/")
        .property(
            "Policies",
            PropertyValue::list(policies.iter().map(|p| p.to_property())),
        )
        .build()
}

pub fn instance_profile(logical_id: &str, role: PropertyValue) -> TemplateResult<ResourceDescription> {
    ResourceBuilder::new(ResourceKind::InstanceProfile, logical_id)
        .property("Path", "/")
        .property("Roles", PropertyValue::list([role]))
        .build()
}
