//! Child template registry.
//!
//! The registry owns the root template and every attached child. Attaching
//! a child resolves each of its declared parameters against the root, then
//! embeds the child as a single nested stack resource in the root.

use std::collections::BTreeMap;
use std::fmt;

use frederick_template::{
    child_file_name, object_key, sanitize_logical_id, PropertyValue, RenderedBundle,
    RenderedDocument, ResourceBuilder, ResourceKind, Template,
};
use tracing::{debug, info};

use frederick_deploy::MANIFEST_FILE;

use crate::config::DeploymentConfig;
use crate::error::{ComposeError, ComposeResult};

/// References the root establishes once per composition, outside its outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WellKnownRefs {
    refs: BTreeMap<String, PropertyValue>,
}

impl WellKnownRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.refs.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.refs.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.refs.keys().map(String::as_str).collect()
    }
}

/// Where a child parameter got its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    RootOutput,
    WellKnown,
    /// The child's own default; nothing is passed from the root.
    Default,
}

impl BindingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingSource::RootOutput => "root output",
            BindingSource::WellKnown => "well-known",
            BindingSource::Default => "default",
        }
    }
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub parameter: String,
    pub source: BindingSource,
    /// Value passed to the nested stack, `None` for defaults.
    pub value: Option<PropertyValue>,
}

/// Upload location of child documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLocation {
    pub bucket: String,
    pub prefix: String,
}

impl TemplateLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn url(&self, file_name: &str) -> String {
        format!(
            "https://{}.s3.amazonaws.com/{}",
            self.bucket,
            object_key(&self.prefix, file_name)
        )
    }
}

impl From<&DeploymentConfig> for TemplateLocation {
    fn from(config: &DeploymentConfig) -> Self {
        Self::new(config.template_bucket.clone(), config.template_prefix.clone())
    }
}

/// A child that has been accepted into the composition.
#[derive(Debug, Clone)]
pub struct AttachedChild {
    pub namespace: String,
    pub stack_logical_id: String,
    pub template: Template,
    pub bindings: Vec<ParameterBinding>,
}

impl AttachedChild {
    pub fn file_name(&self) -> String {
        child_file_name(&self.namespace)
    }

    pub fn binding(&self, parameter: &str) -> Option<&ParameterBinding> {
        self.bindings.iter().find(|b| b.parameter == parameter)
    }
}

/// Accepts children into a root template.
#[derive(Debug, Clone)]
pub struct ChildRegistry {
    root: Template,
    well_known: WellKnownRefs,
    location: TemplateLocation,
    children: Vec<AttachedChild>,
}

impl ChildRegistry {
    pub fn new(root: Template, well_known: WellKnownRefs, location: TemplateLocation) -> Self {
        Self {
            root,
            well_known,
            location,
            children: Vec::new(),
        }
    }

    pub fn root(&self) -> &Template {
        &self.root
    }

    pub fn children(&self) -> &[AttachedChild] {
        &self.children
    }

    pub fn child(&self, namespace: &str) -> Option<&AttachedChild> {
        self.children.iter().find(|c| c.namespace == namespace)
    }

    /// Attach a child template.
    ///
    /// On any error the root and the registry are left unchanged.
    pub fn attach(&mut self, child: Template) -> ComposeResult<&AttachedChild> {
        let namespace = sanitize_logical_id(child.name());
        if namespace.is_empty() {
            return Err(ComposeError::validation(
                "child template",
                format!("'{}' does not yield a usable namespace", child.name()),
            ));
        }

        let stack_logical_id = format!("{}Stack", namespace);
        if self.child(&namespace).is_some() || self.root.contains(&stack_logical_id) {
            return Err(ComposeError::DuplicateId {
                template: self.root.name().to_string(),
                logical_id: namespace,
            });
        }

        child.validate_references()?;

        let bindings = child
            .parameters()
            .iter()
            .map(|spec| self.resolve(child.name(), &spec.name, spec.default.is_some()))
            .collect::<ComposeResult<Vec<_>>>()?;

        let parameters: Vec<(String, PropertyValue)> = bindings
            .iter()
            .filter_map(|b| b.value.clone().map(|v| (b.parameter.clone(), v)))
            .collect();

        let mut stack = ResourceBuilder::new(ResourceKind::Stack, stack_logical_id.clone())
            .property("TemplateURL", self.location.url(&child_file_name(&namespace)));
        if !parameters.is_empty() {
            stack = stack.property("Parameters", PropertyValue::map(parameters));
        }
        self.root.add(stack.build()?)?;

        info!(
            "Attached {} as {} ({} resources, {} parameters)",
            child.name(),
            stack_logical_id,
            child.resources().len(),
            bindings.len()
        );

        self.children.push(AttachedChild {
            namespace,
            stack_logical_id,
            template: child,
            bindings,
        });
        Ok(&self.children[self.children.len() - 1])
    }

    /// Root outputs first, then well-known references, then the default.
    fn resolve(&self, child: &str, parameter: &str, has_default: bool) -> ComposeResult<ParameterBinding> {
        let (source, value) = if let Some(output) = self.root.output(parameter) {
            (BindingSource::RootOutput, Some(output.value.clone()))
        } else if let Some(value) = self.well_known.get(parameter) {
            (BindingSource::WellKnown, Some(value.clone()))
        } else if has_default {
            (BindingSource::Default, None)
        } else {
            return Err(ComposeError::UnresolvedParameter {
                child: child.to_string(),
                parameter: parameter.to_string(),
            });
        };

        debug!("{}.{} bound from {}", child, parameter, source);
        Ok(ParameterBinding {
            parameter: parameter.to_string(),
            source,
            value,
        })
    }

    pub fn into_tree(self) -> CompositionTree {
        CompositionTree {
            root: self.root,
            location: self.location,
            children: self.children,
        }
    }
}

/// The finished composition: a root and its attached children.
#[derive(Debug, Clone)]
pub struct CompositionTree {
    pub root: Template,
    pub location: TemplateLocation,
    pub children: Vec<AttachedChild>,
}

impl CompositionTree {
    /// Serialise every template; the root is written as `root_file_name`.
    ///
    /// Every document lands in one directory, so the root name must not
    /// collide with a child document or the manifest.
    pub fn render(&self, region: &str, root_file_name: &str) -> ComposeResult<RenderedBundle> {
        if root_file_name == MANIFEST_FILE {
            return Err(ComposeError::validation(
                "template_file",
                format!("root file name '{}' is reserved for the manifest", root_file_name),
            ));
        }
        if let Some(child) = self.children.iter().find(|c| c.file_name() == root_file_name) {
            return Err(ComposeError::validation(
                "template_file",
                format!(
                    "root file name '{}' collides with the {} child document",
                    root_file_name, child.namespace
                ),
            ));
        }

        let root = RenderedDocument::from_template(&self.root, root_file_name, None)?;

        let children = self
            .children
            .iter()
            .map(|child| {
                let file_name = child.file_name();
                let url = self.location.url(&file_name);
                let bindings = child
                    .bindings
                    .iter()
                    .map(|b| (b.parameter.clone(), b.source.to_string()))
                    .collect();
                Ok(RenderedDocument::from_template(&child.template, file_name, Some(url))?
                    .with_stack(child.stack_logical_id.clone(), bindings))
            })
            .collect::<ComposeResult<Vec<_>>>()?;

        Ok(RenderedBundle {
            environment: self.root.name().to_string(),
            region: region.to_string(),
            root,
            children,
        })
    }
}
