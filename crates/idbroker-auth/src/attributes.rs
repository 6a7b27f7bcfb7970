//! Attribute resolution.
//!
//! A service client declares the attributes it wants in its catalog; the
//! ticket carries what is actually known about the user. Only attributes that
//! are both declared and *set* on the ticket are released, and only those
//! are subject to consent.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::{ServiceClient, Ticket};

/// Attribute catalog of a service client, in declaration order.
pub type AttributeCatalog = IndexMap<String, AttributeDefinition>;

/// Description of an attribute a service client can request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// The attribute key. Filled in by [`required_attributes`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    /// Human-readable name shown on the consent screen.
    #[serde(default)]
    pub name: String,

    /// Longer description shown on the consent screen.
    #[serde(default)]
    pub description: String,
}

impl AttributeDefinition {
    /// Creates a definition with a display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            name: name.into(),
            description: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Value of a ticket attribute.
///
/// The shapes are closed: an attribute is either absent, a scalar, a
/// collection or a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum AttributeValue {
    /// No value (`null` on the wire).
    Absent,
    /// A string, number or boolean.
    Scalar(Value),
    /// A list of values.
    Collection(Vec<Value>),
    /// A nested object.
    Mapping(Map<String, Value>),
}

impl AttributeValue {
    /// Creates a string scalar.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Value::String(value.into()))
    }

    /// Returns `true` if the value counts as set.
    ///
    /// Absent values, empty collections and empty mappings are unset. Every
    /// scalar is set, including `false`, `0` and the empty string.
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            Self::Absent => false,
            Self::Scalar(_) => true,
            Self::Collection(items) => !items.is_empty(),
            Self::Mapping(entries) => !entries.is_empty(),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Array(items) => Self::Collection(items),
            Value::Object(entries) => Self::Mapping(entries),
            scalar => Self::Scalar(scalar),
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Absent => Value::Null,
            AttributeValue::Scalar(scalar) => scalar,
            AttributeValue::Collection(items) => Value::Array(items),
            AttributeValue::Mapping(entries) => Value::Object(entries),
        }
    }
}

/// Returns `true` if an optional ticket value counts as set.
#[must_use]
pub fn attribute_is_set(value: Option<&AttributeValue>) -> bool {
    value.is_some_and(AttributeValue::is_set)
}

/// Computes the attributes a service client actually receives for a ticket.
///
/// Iterates the client's catalog in declaration order and keeps each
/// attribute whose ticket value is set. The returned definitions carry their
/// key.
#[must_use]
pub fn required_attributes(service_client: &ServiceClient, ticket: &Ticket) -> AttributeCatalog {
    service_client
        .attributes
        .iter()
        .filter(|(key, _)| attribute_is_set(ticket.attributes.get(key.as_str())))
        .map(|(key, definition)| {
            let mut definition = definition.clone();
            definition.key.clone_from(key);
            (key.clone(), definition)
        })
        .collect()
}
