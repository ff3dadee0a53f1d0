//! Property: a typed attribute definition.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Audit;
use crate::{Error, Result};

/// Opaque property identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub Uuid);

impl PropertyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PropertyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The value kind a property holds. Selects both the value slot a
/// `ContactProperty` carries and the filter applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    /// Short, single-line text.
    Singleline,
    /// Long free-form text.
    Textarea,
    /// One of the property's enumerated options.
    Option,
}

impl PropertyType {
    pub const ALL: [PropertyType; 3] = [
        PropertyType::Singleline,
        PropertyType::Textarea,
        PropertyType::Option,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Singleline => "singleline",
            PropertyType::Textarea => "textarea",
            PropertyType::Option => "option",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "singleline" => Ok(PropertyType::Singleline),
            "textarea" => Ok(PropertyType::Textarea),
            "option" => Ok(PropertyType::Option),
            other => Err(Error::ValidationError(format!(
                "unknown property type '{other}' (expected singleline, textarea or option)"
            ))),
        }
    }
}

/// An attribute definition. Contacts carry values for properties, never
/// fixed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub audit: Audit,
}

impl Property {
    pub fn new(slug: impl Into<String>, name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            id: PropertyId::new(),
            slug: slug.into(),
            name: name.into(),
            property_type,
            audit: Audit::now(None),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.audit.created_at
    }

    pub fn is_option(&self) -> bool {
        self.property_type == PropertyType::Option
    }
}

/// Normalise free text into an identifier: lower-case, trimmed, and every
/// character outside `[a-zA-Z0-9_]` replaced by `_`.
///
/// Used for property slugs derived from names and option codes derived
/// from display values.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
