//! # Directory Model
//!
//! Plain DTOs for the entity-attribute-value store. These types cross
//! every boundary: storage ↔ filter ↔ projection ↔ HTTP.
//!
//! Design rule: this module is pure data. No I/O, locks or async.

pub mod audit;
pub mod contact;
pub mod contact_property;
pub mod option;
pub mod property;
pub mod value;

pub use audit::{Audit, UserId};
pub use contact::{Contact, ContactId, ContactRecord};
pub use contact_property::{ContactProperty, ContactPropertyId};
pub use option::{OptionId, PropertyOption, sort_options};
pub use property::{Property, PropertyId, PropertyType, slugify};
pub use value::{PropertyValue, ResolvedValue};
