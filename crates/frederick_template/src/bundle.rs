//! Rendered output of a full composition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TemplateResult;
use crate::template::Template;

/// File name used for a child document.
pub fn child_file_name(namespace: &str) -> String {
    format!("{}.template.json", namespace)
}

/// Object key of a document under an upload prefix.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// One serialised template document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Template name, the namespace for children.
    pub name: String,
    pub file_name: String,
    /// Where the parent expects to fetch the document, children only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,
    pub resource_count: usize,
    /// Logical id of the nested stack resource in the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_logical_id: Option<String>,
    /// Parameter name to binding source, e.g. `vpcId -> root output`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,
    #[serde(skip)]
    pub body: String,
}

impl RenderedDocument {
    pub fn from_template(
        template: &Template,
        file_name: impl Into<String>,
        template_url: Option<String>,
    ) -> TemplateResult<Self> {
        Ok(Self {
            name: template.name().to_string(),
            file_name: file_name.into(),
            template_url,
            resource_count: template.resources().len(),
            stack_logical_id: None,
            bindings: BTreeMap::new(),
            body: template.to_json()?,
        })
    }

    /// Record how the parent embeds this document.
    pub fn with_stack(
        mut self,
        stack_logical_id: impl Into<String>,
        bindings: BTreeMap<String, String>,
    ) -> Self {
        self.stack_logical_id = Some(stack_logical_id.into());
        self.bindings = bindings;
        self
    }
}

/// Summary written next to the documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub environment: String,
    pub region: String,
    pub root: RenderedDocument,
    pub children: Vec<RenderedDocument>,
}

/// The root document plus every child document, in attachment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBundle {
    pub environment: String,
    pub region: String,
    pub root: RenderedDocument,
    pub children: Vec<RenderedDocument>,
}

impl RenderedBundle {
    /// Root first, then children.
    pub fn documents(&self) -> impl Iterator<Item = &RenderedDocument> {
        std::iter::once(&self.root).chain(self.children.iter())
    }

    pub fn child(&self, name: &str) -> Option<&RenderedDocument> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            environment: self.environment.clone(),
            region: self.region.clone(),
            root: self.root.clone(),
            children: self.children.clone(),
        }
    }

    pub fn manifest_json(&self) -> TemplateResult<String> {
        Ok(serde_json::to_string_pretty(&self.manifest())?)
    }
}
