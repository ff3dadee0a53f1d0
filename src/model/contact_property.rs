//! ContactProperty: the binding of one contact to one property value.

use serde::{Deserialize, Serialize};

use super::{Audit, ContactId, PropertyId, PropertyValue};

/// Opaque binding identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactPropertyId(pub u64);

impl std::fmt::Display for ContactPropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single value of `property` held by `contact`.
///
/// `(contact, property)` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactProperty {
    pub id: ContactPropertyId,
    pub contact: ContactId,
    pub property: PropertyId,
    pub value: PropertyValue,
    pub audit: Audit,
}

impl ContactProperty {
    pub fn references_option(&self, option: super::OptionId) -> bool {
        self.value.as_option() == Some(option)
    }
}
