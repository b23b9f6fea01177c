//! Template input parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Parameter types understood by the stack orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Number,
    CommaDelimitedList,
    VpcId,
    SubnetId,
    SecurityGroupId,
    ImageId,
}

impl Default for ParameterType {
    fn default() -> Self {
        Self::String
    }
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "String",
            ParameterType::Number => "Number",
            ParameterType::CommaDelimitedList => "CommaDelimitedList",
            ParameterType::VpcId => "AWS::EC2::VPC::Id",
            ParameterType::SubnetId => "AWS::EC2::Subnet::Id",
            ParameterType::SecurityGroupId => "AWS::EC2::SecurityGroup::Id",
            ParameterType::ImageId => "AWS::EC2::Image::Id",
        }
    }
}

/// An input slot a template expects to receive from its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub description: Option<String>,
    /// Value used when the parent supplies no binding.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub no_echo: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            default: None,
            no_echo: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::String)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }

    /// Rendered form for the `Parameters` section.
    pub fn to_json(&self) -> JsonValue {
        let mut body = Map::new();
        body.insert("Type".to_string(), JsonValue::from(self.param_type.as_str()));
        if let Some(description) = &self.description {
            body.insert("Description".to_string(), JsonValue::from(description.as_str()));
        }
        if let Some(default) = &self.default {
            body.insert("Default".to_string(), JsonValue::from(default.as_str()));
        }
        if self.no_echo {
            body.insert("NoEcho".to_string(), JsonValue::Bool(true));
        }
        JsonValue::Object(body)
    }
}
