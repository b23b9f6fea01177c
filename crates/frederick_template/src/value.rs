//! Property values and intrinsic references.
//!
//! A [`PropertyValue`] is the data carried by a resource property. Besides
//! plain scalars, lists and maps it can hold typed references to other
//! resources or parameters (`Ref`, `GetAtt`), which is what allows the
//! template to check reference integrity before anything is rendered.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{json, Value as JsonValue};

/// Ordered mapping of property names to values.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Prefix shared by the provider's pseudo parameters (`AWS::Region`, ...).
const PSEUDO_PARAMETER_PREFIX: &str = "AWS::";

/// A resource property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<PropertyValue>),
    Map(Properties),
    /// Reference to a resource or parameter by logical id.
    Ref(String),
    /// Attribute of a resource in the same template.
    GetAtt { logical_id: String, attribute: String },
    /// Concatenation of parts with a delimiter.
    Join {
        delimiter: String,
        parts: Vec<PropertyValue>,
    },
    Base64(Box<PropertyValue>),
}

impl PropertyValue {
    /// Reference a resource or parameter.
    pub fn reference(target: impl Into<String>) -> Self {
        Self::Ref(target.into())
    }

    /// Reference an attribute of a resource.
    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = PropertyValue>) -> Self {
        Self::Join {
            delimiter: delimiter.into(),
            parts: parts.into_iter().collect(),
        }
    }

    pub fn base64(value: PropertyValue) -> Self {
        Self::Base64(Box::new(value))
    }

    /// Build a map value from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(items: impl IntoIterator<Item = PropertyValue>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as an integer, accepting numeric strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether the value is a reference or contains one.
    pub fn is_intrinsic(&self) -> bool {
        matches!(
            self,
            Self::Ref(_) | Self::GetAtt { .. } | Self::Join { .. } | Self::Base64(_)
        )
    }

    /// Collect every logical id this value references, in traversal order.
    ///
    /// Pseudo parameters are not included.
    pub fn references(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            Self::Ref(target) => {
                if !is_pseudo_parameter(target) {
                    found.push(target);
                }
            }
            Self::GetAtt { logical_id, .. } => found.push(logical_id),
            Self::List(items) => items.iter().for_each(|i| i.collect_references(found)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(found)),
            Self::Join { parts, .. } => parts.iter().for_each(|p| p.collect_references(found)),
            Self::Base64(inner) => inner.collect_references(found),
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::String(_) => {}
        }
    }

    /// Render to the JSON representation used in template documents.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => json!(i),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(|i| i.to_json()).collect()),
            Self::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Ref(target) => json!({ "Ref": target }),
            Self::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Self::Join { delimiter, parts } => {
                let parts: Vec<JsonValue> = parts.iter().map(|p| p.to_json()).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            Self::Base64(inner) => json!({ "Fn::Base64": inner.to_json() }),
        }
    }
}

/// Whether a reference target is one of the provider's pseudo parameters.
pub fn is_pseudo_parameter(target: &str) -> bool {
    target.starts_with(PSEUDO_PARAMETER_PREFIX)
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for PropertyValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(value: Vec<PropertyValue>) -> Self {
        Self::List(value)
    }
}

impl From<Properties> for PropertyValue {
    fn from(value: Properties) -> Self {
        Self::Map(value)
    }
}

/// Plain JSON documents (policy documents, for instance) carry no references.
impl From<JsonValue> for PropertyValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::String(n.to_string()),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_are_collected_recursively() {
        let value = PropertyValue::map([
            ("VpcId", PropertyValue::reference("vpcId")),
            (
                "Targets",
                PropertyValue::list([
                    PropertyValue::attribute("Directory", "DnsIpAddresses"),
                    PropertyValue::join("", [PropertyValue::reference("AWS::Region"), "x".into()]),
                ]),
            ),
        ]);

        let refs = value.references();
        assert_eq!(refs, vec!["Directory", "vpcId"]);
    }

    #[test]
    fn test_intrinsics_render_to_json() {
        let value = PropertyValue::base64(PropertyValue::join(
            "",
            [PropertyValue::from("#!/bin/bash\n"), PropertyValue::reference("AWS::StackName")],
        ));

        let rendered = value.to_json();
        assert_eq!(
            rendered,
            json!({ "Fn::Base64": { "Fn::Join": ["", ["#!/bin/bash\n", { "Ref": "AWS::StackName" }]] } })
        );
    }

    #[test]
    fn test_numeric_strings_read_as_int() {
        assert_eq!(PropertyValue::from("5432").as_int(), Some(5432));
        assert_eq!(PropertyValue::from(80u16).as_int(), Some(80));
        assert_eq!(PropertyValue::from("http").as_int(), None);
    }
}
