//! Contact: a featureless entity whose data lives in its property values.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Audit, ContactProperty, PropertyId};

/// Opaque contact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub Uuid);

impl ContactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ContactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ContactId)
    }
}

/// A contact in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub audit: Audit,
}

impl Contact {
    pub fn new(id: ContactId) -> Self {
        Self { id, audit: Audit::now(None) }
    }
}

/// A contact together with every value it holds, loaded in one pass so
/// that filtering and projection never go back to storage per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub contact: Contact,
    pub values: Vec<ContactProperty>,
}

impl ContactRecord {
    pub fn new(contact: Contact) -> Self {
        Self { contact, values: Vec::new() }
    }

    pub fn id(&self) -> ContactId {
        self.contact.id
    }

    /// The value bound to `property`, if any. At most one exists.
    pub fn value_for(&self, property: PropertyId) -> Option<&ContactProperty> {
        self.values.iter().find(|v| v.property == property)
    }
}
