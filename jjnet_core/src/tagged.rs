//! Tags and typed properties shared by every topology element.
//!
//! Tags classify an entity (`x`, `boundary`, `north`, ...) and drive tag
//! expression queries. Properties carry bookkeeping such as the integer grid
//! coordinates the lattice builder records.

use crate::error::PropertyError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The closed set of property value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Real,
    Integer,
    Boolean,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Real => "real",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
}

impl PropertyValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Real(_) => ValueKind::Real,
            PropertyValue::Integer(_) => ValueKind::Integer,
            PropertyValue::Boolean(_) => ValueKind::Boolean,
            PropertyValue::Text(_) => ValueKind::Text,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Real(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Boolean(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

/// A Rust type that a property can be read as.
pub trait PropertyKind: Sized {
    /// The value kind this type reads.
    const KIND: ValueKind;

    /// Extracts the value if the kind matches.
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl PropertyKind for f64 {
    const KIND: ValueKind = ValueKind::Real;

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyKind for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyKind for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyKind for String {
    const KIND: ValueKind = ValueKind::Text;

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Tag set plus property bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tagged {
    tags: BTreeSet<String>,
    properties: BTreeMap<String, PropertyValue>,
}

impl Tagged {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag. Adding an existing tag is a no-op.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Tags in lexical order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Sets a property, replacing any previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Reads a property as `T`.
    ///
    /// Fails with `NotFound` when absent and `TypeMismatch` when stored
    /// under another kind.
    pub fn property<T: PropertyKind>(&self, key: &str) -> Result<T, PropertyError> {
        let value = self
            .properties
            .get(key)
            .ok_or_else(|| PropertyError::NotFound { key: key.to_string() })?;

        T::from_value(value).ok_or_else(|| PropertyError::TypeMismatch {
            key: key.to_string(),
            expected: T::KIND,
            found: value.kind(),
        })
    }

    pub fn raw_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Anything carrying a `Tagged` base.
pub trait TaggedEntity {
    fn tagged(&self) -> &Tagged;
    fn tagged_mut(&mut self) -> &mut Tagged;

    fn add_tag(&mut self, tag: impl Into<String>) {
        self.tagged_mut().add_tag(tag);
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tagged().has_tag(tag)
    }

    fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.tagged_mut().set_property(key, value);
    }

    fn property<T: PropertyKind>(&self, key: &str) -> Result<T, PropertyError> {
        self.tagged().property(key)
    }
}

impl TaggedEntity for Tagged {
    fn tagged(&self) -> &Tagged {
        self
    }

    fn tagged_mut(&mut self) -> &mut Tagged {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_a_set() {
        let mut t = Tagged::new();
        t.add_tag("inner");
        t.add_tag("inner");
        t.add_tag("x");

        assert!(t.has_tag("inner"));
        assert!(!t.has_tag("boundary"));
        assert_eq!(t.tag_count(), 2);
        assert_eq!(t.tags().collect::<Vec<_>>(), vec!["inner", "x"]);
    }

    #[test]
    fn test_property_roundtrip_by_kind() {
        let mut t = Tagged::new();
        t.set_property("x", 3_i64);
        t.set_property("area", 1.5);
        t.set_property("pinned", true);
        t.set_property("label", "edge");

        assert_eq!(t.property::<i64>("x"), Ok(3));
        assert_eq!(t.property::<f64>("area"), Ok(1.5));
        assert_eq!(t.property::<bool>("pinned"), Ok(true));
        assert_eq!(t.property::<String>("label"), Ok("edge".to_string()));
    }

    #[test]
    fn test_property_overwrites() {
        let mut t = Tagged::new();
        t.set_property("x", 1_i64);
        t.set_property("x", 2_i64);
        assert_eq!(t.property::<i64>("x"), Ok(2));
    }

    #[test]
    fn test_missing_property_is_not_found() {
        let t = Tagged::new();
        assert_eq!(
            t.property::<i64>("y"),
            Err(PropertyError::NotFound { key: "y".to_string() })
        );
    }

    #[test]
    fn test_wrong_kind_is_type_mismatch() {
        let mut t = Tagged::new();
        t.set_property("y", 4_i64);
        assert_eq!(
            t.property::<f64>("y"),
            Err(PropertyError::TypeMismatch {
                key: "y".to_string(),
                expected: ValueKind::Real,
                found: ValueKind::Integer,
            })
        );
    }
}
