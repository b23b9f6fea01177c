//! # frederick_template
//!
//! Typed infrastructure template model for Frederick.
//!
//! This crate provides:
//! - [`ResourceBuilder`] for validated, immutable resource descriptions
//! - [`Template`], an append-only collection with reference integrity
//! - [`Ipv4Cidr`] for network range parsing and subnet carving
//! - [`RenderedBundle`], the serialised output handed to deployers

pub mod bundle;
pub mod cidr;
pub mod error;
pub mod kind;
pub mod parameter;
pub mod resource;
pub mod template;
pub mod value;

pub use bundle::{child_file_name, object_key, Manifest, RenderedBundle, RenderedDocument};
pub use cidr::Ipv4Cidr;
pub use error::{TemplateError, TemplateResult};
pub use kind::{PropertySpec, ResourceKind, Semantic};
pub use parameter::{ParameterSpec, ParameterType};
pub use resource::{build, sanitize_logical_id, ResourceBuilder, ResourceDescription};
pub use template::{
    OutputSpec, Reference, ReferenceTarget, RenderedEntry, RenderedTemplate, Template,
    FORMAT_VERSION,
};
pub use value::{is_pseudo_parameter, Properties, PropertyValue};
