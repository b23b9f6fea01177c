//! Templates: ordered, append-only collections of resources.
//!
//! A [`Template`] owns its resources, its declared input parameters and its
//! outputs. Resources and parameters share one logical id namespace. Every
//! reference a resource carries must resolve inside the same template at the
//! time it is added, which is what makes forward composition safe: the
//! [`Reference`] returned by [`Template::add`] is the only handle later
//! resources need.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::parameter::ParameterSpec;
use crate::resource::ResourceDescription;
use crate::value::PropertyValue;

/// Template format version emitted in every document.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// What a [`Reference`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget {
    Resource,
    Parameter,
}

/// Opaque handle to a resource or parameter inside one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    logical_id: String,
    target: ReferenceTarget,
}

impl Reference {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn target(&self) -> ReferenceTarget {
        self.target
    }

    /// `Ref` to the resource or parameter.
    pub fn to_ref(&self) -> PropertyValue {
        PropertyValue::reference(&self.logical_id)
    }

    /// `GetAtt` on the resource.
    pub fn attr(&self, attribute: impl Into<String>) -> PropertyValue {
        PropertyValue::attribute(&self.logical_id, attribute)
    }
}

impl From<&Reference> for PropertyValue {
    fn from(reference: &Reference) -> Self {
        reference.to_ref()
    }
}

/// A value exposed by a template.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub name: String,
    pub value: PropertyValue,
    pub description: Option<String>,
}

/// An ordered collection of resources plus parameters and outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    description: Option<String>,
    parameters: Vec<ParameterSpec>,
    resources: Vec<ResourceDescription>,
    outputs: Vec<OutputSpec>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn resources(&self) -> &[ResourceDescription] {
        &self.resources
    }

    pub fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&ResourceDescription> {
        self.resources.iter().find(|r| r.logical_id() == logical_id)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Whether a logical id is taken by a resource or a parameter.
    pub fn contains(&self, logical_id: &str) -> bool {
        self.resource(logical_id).is_some() || self.parameter(logical_id).is_some()
    }

    /// Append a resource.
    ///
    /// Fails without modifying the template when the logical id is taken or
    /// when the resource references something the template does not hold.
    pub fn add(&mut self, resource: ResourceDescription) -> TemplateResult<Reference> {
        let logical_id = resource.logical_id().to_string();

        if self.contains(&logical_id) {
            return Err(self.duplicate(&logical_id));
        }

        if let Some(target) = resource.references().into_iter().find(|r| !self.contains(r)) {
            return Err(TemplateError::UnresolvedReference {
                template: self.name.clone(),
                logical_id,
                target: target.to_string(),
            });
        }

        debug!("Adding {} to template {}", logical_id, self.name);
        self.resources.push(resource);

        Ok(Reference {
            logical_id,
            target: ReferenceTarget::Resource,
        })
    }

    /// Register an expected input.
    pub fn declare_parameter(&mut self, spec: ParameterSpec) -> TemplateResult<Reference> {
        if self.contains(&spec.name) {
            return Err(self.duplicate(&spec.name));
        }

        let logical_id = spec.name.clone();
        self.parameters.push(spec);

        Ok(Reference {
            logical_id,
            target: ReferenceTarget::Parameter,
        })
    }

    /// Expose a resource, attribute or parameter to the parent.
    pub fn declare_output(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> TemplateResult<()> {
        self.declare_output_with_description(name, value, None::<String>)
    }

    pub fn declare_output_with_description(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        description: Option<impl Into<String>>,
    ) -> TemplateResult<()> {
        let name = name.into();
        let value = value.into();

        if self.output(&name).is_some() {
            return Err(self.duplicate(&name));
        }

        if let Some(target) = value.references().into_iter().find(|r| !self.contains(r)) {
            return Err(TemplateError::UnresolvedReference {
                template: self.name.clone(),
                logical_id: name,
                target: target.to_string(),
            });
        }

        self.outputs.push(OutputSpec {
            name,
            value,
            description: description.map(Into::into),
        });
        Ok(())
    }

    /// Re-check that every reference resolves inside this template.
    pub fn validate_references(&self) -> TemplateResult<()> {
        for resource in &self.resources {
            if let Some(target) = resource.references().into_iter().find(|r| !self.contains(r)) {
                return Err(TemplateError::UnresolvedReference {
                    template: self.name.clone(),
                    logical_id: resource.logical_id().to_string(),
                    target: target.to_string(),
                });
            }
        }

        for output in &self.outputs {
            if let Some(target) = output.value.references().into_iter().find(|r| !self.contains(r)) {
                return Err(TemplateError::UnresolvedReference {
                    template: self.name.clone(),
                    logical_id: output.name.clone(),
                    target: target.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Produce the ordered, read-only view of this template.
    pub fn render(&self) -> RenderedTemplate {
        RenderedTemplate {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|p| RenderedEntry {
                    name: p.name.clone(),
                    body: p.to_json(),
                })
                .collect(),
            resources: self
                .resources
                .iter()
                .map(|r| RenderedEntry {
                    name: r.logical_id().to_string(),
                    body: render_resource(r),
                })
                .collect(),
            outputs: self
                .outputs
                .iter()
                .map(|o| RenderedEntry {
                    name: o.name.clone(),
                    body: render_output(o),
                })
                .collect(),
        }
    }

    /// Serialise the template document.
    pub fn to_json(&self) -> TemplateResult<String> {
        self.render().to_json_string()
    }

    fn duplicate(&self, logical_id: &str) -> TemplateError {
        TemplateError::DuplicateId {
            template: self.name.clone(),
            logical_id: logical_id.to_string(),
        }
    }
}

fn render_resource(resource: &ResourceDescription) -> JsonValue {
    let mut body = Map::new();
    body.insert("Type".to_string(), JsonValue::from(resource.kind().as_str()));

    if !resource.properties().is_empty() {
        let properties = resource
            .properties()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        body.insert("Properties".to_string(), JsonValue::Object(properties));
    }

    if !resource.depends_on().is_empty() {
        let depends_on = resource
            .depends_on()
            .iter()
            .map(|d| JsonValue::from(d.as_str()))
            .collect();
        body.insert("DependsOn".to_string(), JsonValue::Array(depends_on));
    }

    if let Some(policy) = resource.deletion_policy() {
        body.insert("DeletionPolicy".to_string(), JsonValue::from(policy));
    }

    if let Some(policy) = resource.update_policy() {
        body.insert("UpdatePolicy".to_string(), policy.to_json());
    }

    JsonValue::Object(body)
}

fn render_output(output: &OutputSpec) -> JsonValue {
    let mut body = Map::new();
    if let Some(description) = &output.description {
        body.insert("Description".to_string(), JsonValue::from(description.as_str()));
    }
    body.insert("Value".to_string(), output.value.to_json());
    JsonValue::Object(body)
}

/// One named section entry of a rendered template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEntry {
    pub name: String,
    pub body: JsonValue,
}

/// Ordered rendering of a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTemplate {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<RenderedEntry>,
    pub resources: Vec<RenderedEntry>,
    pub outputs: Vec<RenderedEntry>,
}

impl RenderedTemplate {
    /// The self-describing document: parameters, resources keyed by
    /// logical id, outputs.
    pub fn document(&self) -> JsonValue {
        let mut doc = Map::new();
        doc.insert(
            "AWSTemplateFormatVersion".to_string(),
            JsonValue::from(FORMAT_VERSION),
        );
        if let Some(description) = &self.description {
            doc.insert("Description".to_string(), JsonValue::from(description.as_str()));
        }
        if !self.parameters.is_empty() {
            doc.insert("Parameters".to_string(), section(&self.parameters));
        }
        doc.insert("Resources".to_string(), section(&self.resources));
        if !self.outputs.is_empty() {
            doc.insert("Outputs".to_string(), section(&self.outputs));
        }
        JsonValue::Object(doc)
    }

    pub fn to_json_string(&self) -> TemplateResult<String> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }
}

fn section(entries: &[RenderedEntry]) -> JsonValue {
    JsonValue::Object(
        entries
            .iter()
            .map(|e| (e.name.clone(), e.body.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ResourceKind;
    use crate::parameter::{ParameterSpec, ParameterType};
    use crate::resource::ResourceBuilder;

    fn security_group(id: &str, vpc: PropertyValue) -> ResourceDescription {
        ResourceBuilder::new(ResourceKind::SecurityGroup, id)
            .property("GroupDescription", "test group")
            .property("VpcId", vpc)
            .build()
            .unwrap()
    }

    #[test]
    fn test_add_returns_usable_reference() {
        let mut template = Template::new("Network");
        let vpc = template
            .add(
                ResourceBuilder::new(ResourceKind::Vpc, "VPC")
                    .property("CidrBlock", "10.0.0.0/16")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let sg = template.add(security_group("appSg", vpc.to_ref())).unwrap();
        assert_eq!(sg.logical_id(), "appSg");
        assert_eq!(sg.target(), ReferenceTarget::Resource);
        assert_eq!(template.resources().len(), 2);
    }

    #[test]
    fn test_duplicate_id_leaves_template_unchanged() {
        let mut template = Template::new("Child");
        let vpc = template
            .declare_parameter(ParameterSpec::new("vpcId", ParameterType::VpcId))
            .unwrap();
        template.add(security_group("appSg", vpc.to_ref())).unwrap();

        let before = template.clone();
        let err = template.add(security_group("appSg", vpc.to_ref())).unwrap_err();

        assert!(matches!(err, TemplateError::DuplicateId { .. }));
        assert_eq!(template, before);
    }

    #[test]
    fn test_parameter_and_resource_share_namespace() {
        let mut template = Template::new("Child");
        template.declare_parameter(ParameterSpec::string("appSg")).unwrap();
        let err = template
            .add(security_group("appSg", PropertyValue::reference("appSg")))
            .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateId { .. }));
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let mut template = Template::new("Child");
        let err = template
            .add(security_group("appSg", PropertyValue::reference("vpcId")))
            .unwrap_err();

        match err {
            TemplateError::UnresolvedReference { target, .. } => assert_eq!(target, "vpcId"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(template.resources().is_empty());
    }

    #[test]
    fn test_pseudo_parameters_resolve() {
        let mut template = Template::new("Child");
        let result = template.add(
            ResourceBuilder::new(ResourceKind::EcsCluster, "cluster")
                .property("ClusterName", PropertyValue::reference("AWS::StackName"))
                .build()
                .unwrap(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut template = Template::new("Child").with_description("test");
        let vpc = template
            .declare_parameter(ParameterSpec::new("vpcId", ParameterType::VpcId))
            .unwrap();
        let sg = template.add(security_group("appSg", vpc.to_ref())).unwrap();
        template.declare_output("appSg", &sg).unwrap();

        let first = template.to_json().unwrap();
        let second = template.to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_preserves_insertion_order() {
        let mut template = Template::new("Child");
        let vpc = template
            .declare_parameter(ParameterSpec::new("vpcId", ParameterType::VpcId))
            .unwrap();
        template.add(security_group("zetaSg", vpc.to_ref())).unwrap();
        template.add(security_group("alphaSg", vpc.to_ref())).unwrap();

        let rendered = template.render();
        let ids: Vec<&str> = rendered.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(ids, vec!["zetaSg", "alphaSg"]);

        let doc = rendered.document();
        let keys: Vec<&String> = doc["Resources"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zetaSg", "alphaSg"]);
        assert_eq!(doc["Parameters"]["vpcId"]["Type"], "AWS::EC2::VPC::Id");
    }

    #[test]
    fn test_output_must_resolve() {
        let mut template = Template::new("Network");
        let err = template
            .declare_output("vpcId", PropertyValue::reference("VPC"))
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedReference { .. }));
    }
}
