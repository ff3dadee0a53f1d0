//! PropertyOption: one admissible value of an option-typed property.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PropertyId;

/// Opaque option identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub Uuid);

impl OptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An enumerated value owned by exactly one option-typed property.
///
/// `(property, code)` is unique; `value` is the display label and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOption {
    pub id: OptionId,
    pub property: PropertyId,
    pub code: String,
    pub value: String,
    pub order: u32,
}

impl PropertyOption {
    pub fn new(property: PropertyId, code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: OptionId::new(),
            property,
            code: code.into(),
            value: value.into(),
            order: 0,
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// Listing order for options: `(order, value)`.
pub fn sort_options(options: &mut [PropertyOption]) {
    options.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.value.cmp(&b.value)));
}
