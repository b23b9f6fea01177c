//! Resource descriptions and the resource builder.
//!
//! Builders are pure: they take typed parameters and return an immutable
//! [`ResourceDescription`], or a validation error when a required property is
//! missing or carries the wrong kind of value.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::cidr::Ipv4Cidr;
use crate::error::{TemplateError, TemplateResult};
use crate::kind::{ResourceKind, Semantic};
use crate::value::{Properties, PropertyValue};

/// Property names holding port numbers, checked wherever they appear.
const PORT_PROPERTIES: &[&str] = &["FromPort", "ToPort", "ContainerPort", "Port"];

/// Property names holding CIDR ranges, checked wherever they appear.
const CIDR_PROPERTIES: &[&str] = &["CidrIp", "CidrBlock", "DestinationCidrBlock"];

fn disallowed_id_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9]").expect("logical id pattern is valid"))
}

/// Derive a logical id fragment from a human-provided name.
///
/// Every character outside `[A-Za-z0-9]` is removed, so
/// `assets.example.com` becomes `assetsexamplecom`. The mapping is
/// deterministic, which keeps re-builds idempotent.
pub fn sanitize_logical_id(name: &str) -> String {
    disallowed_id_chars().replace_all(name, "").into_owned()
}

/// Immutable description of a single resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescription {
    logical_id: String,
    kind: ResourceKind,
    properties: Properties,
    depends_on: BTreeSet<String>,
    deletion_policy: Option<String>,
    update_policy: Option<PropertyValue>,
}

impl ResourceDescription {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn deletion_policy(&self) -> Option<&str> {
        self.deletion_policy.as_deref()
    }

    pub fn update_policy(&self) -> Option<&PropertyValue> {
        self.update_policy.as_ref()
    }

    /// Every logical id this resource points at, through properties,
    /// policies or explicit dependencies.
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .properties
            .values()
            .flat_map(|v| v.references())
            .collect();
        if let Some(policy) = &self.update_policy {
            refs.extend(policy.references());
        }
        refs.extend(self.depends_on.iter().map(|d| d.as_str()));
        refs
    }
}

/// Build a resource from a kind, a name and its properties.
///
/// The name is sanitized into the logical id.
pub fn build(
    kind: ResourceKind,
    name: &str,
    properties: impl IntoIterator<Item = (String, PropertyValue)>,
) -> TemplateResult<ResourceDescription> {
    let mut builder = ResourceBuilder::new(kind, sanitize_logical_id(name));
    for (key, value) in properties {
        builder = builder.property(key, value);
    }
    builder.build()
}

/// Builder for [`ResourceDescription`].
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    logical_id: String,
    kind: ResourceKind,
    properties: Properties,
    depends_on: BTreeSet<String>,
    deletion_policy: Option<String>,
    update_policy: Option<PropertyValue>,
}

impl ResourceBuilder {
    pub fn new(kind: ResourceKind, logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: Properties::new(),
            depends_on: BTreeSet::new(),
            deletion_policy: None,
            update_policy: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property only when a value is present.
    pub fn optional_property<V: Into<PropertyValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.property(name, value),
            None => self,
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.insert(logical_id.into());
        self
    }

    pub fn deletion_policy(mut self, policy: impl Into<String>) -> Self {
        self.deletion_policy = Some(policy.into());
        self
    }

    pub fn update_policy(mut self, policy: PropertyValue) -> Self {
        self.update_policy = Some(policy);
        self
    }

    /// Validate and freeze the resource.
    pub fn build(self) -> TemplateResult<ResourceDescription> {
        let context = format!("{} '{}'", self.kind, self.logical_id);

        if self.logical_id.is_empty() || disallowed_id_chars().is_match(&self.logical_id) {
            return Err(TemplateError::validation(
                context,
                "logical id must be non-empty and alphanumeric",
            ));
        }

        for spec in self.kind.property_specs() {
            match self.properties.get(spec.name) {
                None | Some(PropertyValue::Null) if spec.required => {
                    return Err(TemplateError::validation(
                        context,
                        format!("missing required property '{}'", spec.name),
                    ));
                }
                Some(value) => check_semantic(&context, spec.name, spec.semantic, value)?,
                None => {}
            }
        }

        for (name, value) in &self.properties {
            check_nested(&context, name, value)?;
        }

        debug!("Built {}", context);

        Ok(ResourceDescription {
            logical_id: self.logical_id,
            kind: self.kind,
            properties: self.properties,
            depends_on: self.depends_on,
            deletion_policy: self.deletion_policy,
            update_policy: self.update_policy,
        })
    }
}

fn check_semantic(
    context: &str,
    name: &str,
    semantic: Semantic,
    value: &PropertyValue,
) -> TemplateResult<()> {
    let ok = match (semantic, value) {
        (Semantic::Any, _) => true,
        (_, v) if v.is_intrinsic() => true,
        (Semantic::NonEmpty, PropertyValue::String(s)) => !s.trim().is_empty(),
        (Semantic::NonEmpty, _) => false,
        (Semantic::NonEmptyList, PropertyValue::List(items)) => !items.is_empty(),
        (Semantic::NonEmptyList, _) => false,
    };

    if ok {
        Ok(())
    } else {
        Err(TemplateError::validation(
            context,
            format!("property '{}' must be {}", name, describe(semantic)),
        ))
    }
}

fn describe(semantic: Semantic) -> &'static str {
    match semantic {
        Semantic::Any => "present",
        Semantic::NonEmpty => "a non-empty string",
        Semantic::NonEmptyList => "a non-empty list",
    }
}

/// Check port and CIDR values anywhere in the property tree.
fn check_nested(context: &str, name: &str, value: &PropertyValue) -> TemplateResult<()> {
    if !value.is_intrinsic() {
        if PORT_PROPERTIES.contains(&name) {
            validate_port(context, name, value)?;
        }
        if CIDR_PROPERTIES.contains(&name) {
            validate_cidr(context, name, value)?;
        }
    }

    match value {
        PropertyValue::Map(entries) => entries
            .iter()
            .try_for_each(|(k, v)| check_nested(context, k, v)),
        PropertyValue::List(items) => items.iter().try_for_each(|v| check_nested(context, name, v)),
        _ => Ok(()),
    }
}

fn validate_port(context: &str, name: &str, value: &PropertyValue) -> TemplateResult<()> {
    match value.as_int() {
        Some(port) if (0..=65535).contains(&port) => Ok(()),
        _ => Err(TemplateError::validation(
            context,
            format!("property '{}' is not a port number (0-65535): {}", name, value.to_json()),
        )),
    }
}

fn validate_cidr(context: &str, name: &str, value: &PropertyValue) -> TemplateResult<()> {
    let text = value.as_str().unwrap_or_default();
    text.parse::<Ipv4Cidr>().map(|_| ()).map_err(|e| {
        TemplateError::validation(context, format!("property '{}' is not a valid CIDR: {}", name, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingress(from: impl Into<PropertyValue>, cidr: &str) -> PropertyValue {
        PropertyValue::list([PropertyValue::map([
            ("IpProtocol", "tcp".into()),
            ("FromPort", from.into()),
            ("ToPort", 5432i64.into()),
            ("CidrIp", cidr.into()),
        ])])
    }

    #[test]
    fn test_sanitize_logical_id() {
        assert_eq!(sanitize_logical_id("assets.example.com"), "assetsexamplecom");
        assert_eq!(sanitize_logical_id("aws-frederick_env"), "awsfrederickenv");
        assert_eq!(sanitize_logical_id("assets.example.com"), sanitize_logical_id("assets.example.com"));
    }

    #[test]
    fn test_build_sanitizes_name() {
        let bucket = build(
            ResourceKind::Bucket,
            "assets.example.com.Bucket",
            [("BucketName".to_string(), PropertyValue::from("assets.example.com"))],
        )
        .unwrap();
        assert_eq!(bucket.logical_id(), "assetsexamplecomBucket");
    }

    #[test]
    fn test_missing_required_property() {
        let err = ResourceBuilder::new(ResourceKind::DbInstance, "rdsorders")
            .property("DBInstanceClass", "db.t2.micro")
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("Engine"));
    }

    #[test]
    fn test_empty_text_property_rejected() {
        let err = ResourceBuilder::new(ResourceKind::Bucket, "emptyBucket")
            .property("BucketName", "  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::Validation { .. }));
    }

    #[test]
    fn test_port_out_of_range() {
        let err = ResourceBuilder::new(ResourceKind::SecurityGroup, "dbSg")
            .property("GroupDescription", "db")
            .property("VpcId", PropertyValue::reference("vpcId"))
            .property("SecurityGroupIngress", ingress(70000i64, "10.0.0.0/16"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("FromPort"));
    }

    #[test]
    fn test_port_as_string_accepted() {
        let sg = ResourceBuilder::new(ResourceKind::SecurityGroup, "dbSg")
            .property("GroupDescription", "db")
            .property("VpcId", PropertyValue::reference("vpcId"))
            .property("SecurityGroupIngress", ingress("0", "10.0.0.0/16"))
            .build();
        assert!(sg.is_ok());
    }

    #[test]
    fn test_empty_cidr_rejected() {
        let err = ResourceBuilder::new(ResourceKind::SecurityGroup, "dbSg")
            .property("GroupDescription", "db")
            .property("VpcId", PropertyValue::reference("vpcId"))
            .property("SecurityGroupIngress", ingress(5432i64, ""))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("CidrIp"));
    }

    #[test]
    fn test_invalid_logical_id() {
        let err = ResourceBuilder::new(ResourceKind::EcsCluster, "my-cluster")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("alphanumeric"));
    }

    #[test]
    fn test_references_include_dependencies() {
        let resource = ResourceBuilder::new(ResourceKind::Route, "publicRoute")
            .property("RouteTableId", PropertyValue::reference("publicRouteTable"))
            .property("DestinationCidrBlock", "0.0.0.0/0")
            .depends_on("gatewayAttachment")
            .build()
            .unwrap();

        let refs = resource.references();
        assert!(refs.contains(&"publicRouteTable"));
        assert!(refs.contains(&"gatewayAttachment"));
    }
}
