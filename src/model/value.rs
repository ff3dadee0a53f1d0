//! Typed property values.
//!
//! A value carries its own kind, so a binding can never hold a short text
//! and an option reference at the same time.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{OptionId, PropertyOption, PropertyType};

/// The value stored for one contact/property pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Value of a `singleline` property.
    Text(String),
    /// Value of a `textarea` property.
    RichText(String),
    /// Value of an `option` property: a reference into the property's options.
    OptionRef(OptionId),
}

impl PropertyValue {
    /// The property type this value belongs to.
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Text(_) => PropertyType::Singleline,
            PropertyValue::RichText(_) => PropertyType::Textarea,
            PropertyValue::OptionRef(_) => PropertyType::Option,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.property_type().as_str()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) | PropertyValue::RichText(s) => Some(s),
            PropertyValue::OptionRef(_) => None,
        }
    }

    pub fn as_option(&self) -> Option<OptionId> {
        match self {
            PropertyValue::OptionRef(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(s) | PropertyValue::RichText(s) => f.write_str(s),
            PropertyValue::OptionRef(id) => write!(f, "option:{id}"),
        }
    }
}

/// A stored value with its option reference resolved against the schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedValue<'a> {
    Text(&'a str),
    RichText(&'a str),
    Option(&'a PropertyOption),
}

impl<'a> ResolvedValue<'a> {
    pub fn property_type(&self) -> PropertyType {
        match self {
            ResolvedValue::Text(_) => PropertyType::Singleline,
            ResolvedValue::RichText(_) => PropertyType::Textarea,
            ResolvedValue::Option(_) => PropertyType::Option,
        }
    }
}
