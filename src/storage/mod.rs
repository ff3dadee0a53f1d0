//! # Storage Backend Trait
//!
//! This is THE contract between the directory engine and any durable store.
//! Every read and write the schema store, value store and administrative
//! surface need is defined here.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory for testing/embedding |
//!
//! Backends enforce uniqueness (`(slug, type)`, `(property, code)`,
//! `(contact, property)`) and refuse to delete rows that still have
//! dependents, the way a relational store with restricting foreign keys
//! would. The cascading variants (`cascade_delete_*`) build on that.

pub mod memory;

use async_trait::async_trait;
use crate::model::*;
use crate::schema::Catalog;
use crate::{Error, Result};

pub use memory::MemoryBackend;

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Reads used by the listing path (`catalog`, `all_contacts`) return
/// snapshots; nothing returned here borrows backend state.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    // ========================================================================
    // Schema: properties
    // ========================================================================

    /// Register a property. Fails with `ConstraintViolation` when the
    /// `(slug, type)` pair already exists.
    async fn insert_property(&self, property: Property) -> Result<()>;

    /// Replace a stored property (matched by id).
    async fn update_property(&self, property: Property) -> Result<()>;

    /// Get a property by id. Returns None if not found.
    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>>;

    /// All properties in registration order.
    async fn list_properties(&self) -> Result<Vec<Property>>;

    /// Delete a property and its options. Returns true if it existed.
    /// Fails with `DependencyConflict` while contact values still bind it.
    async fn delete_property(&self, id: PropertyId) -> Result<bool>;

    /// Resolve a slug. When several properties share it, the earliest
    /// registered one is returned.
    ///
    /// Default: linear scan over `list_properties`.
    async fn get_property_by_slug(&self, slug: &str) -> Result<Property> {
        self.list_properties()
            .await?
            .into_iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| Error::NotFound(format!("Property '{slug}'")))
    }

    // ========================================================================
    // Schema: options
    // ========================================================================

    /// Add an option. Fails with `ConstraintViolation` when `(property, code)`
    /// already exists and with `NotFound` when the property is missing.
    async fn insert_option(&self, option: PropertyOption) -> Result<()>;

    /// Replace a stored option (matched by id).
    async fn update_option(&self, option: PropertyOption) -> Result<()>;

    async fn get_option(&self, id: OptionId) -> Result<Option<PropertyOption>>;

    /// Options of one property ordered by `(order, value)`.
    async fn list_options(&self, property: PropertyId) -> Result<Vec<PropertyOption>>;

    /// Every option of every property.
    async fn all_options(&self) -> Result<Vec<PropertyOption>>;

    /// Delete an option. Returns true if it existed.
    /// Fails with `DependencyConflict` while contact values reference it.
    async fn delete_option(&self, id: OptionId) -> Result<bool>;

    /// Number of contact values referencing the option.
    async fn option_usage(&self, id: OptionId) -> Result<u64>;

    /// Snapshot of the whole schema.
    ///
    /// Default: `list_properties` + `all_options`.
    async fn catalog(&self) -> Result<Catalog> {
        let properties = self.list_properties().await?;
        let options = self.all_options().await?;
        Ok(Catalog::new(properties, options))
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    async fn insert_contact(&self, contact: Contact) -> Result<()>;

    /// Get a contact with all of its values.
    async fn get_contact(&self, id: ContactId) -> Result<Option<ContactRecord>>;

    /// Record a change on the contact row itself.
    async fn touch_contact(&self, id: ContactId, actor: Option<UserId>) -> Result<()>;

    /// Delete a contact. Returns true if it existed.
    /// Fails with `DependencyConflict` while the contact still holds values.
    async fn delete_contact(&self, id: ContactId) -> Result<bool>;

    /// Every contact with its values, in creation order.
    async fn all_contacts(&self) -> Result<Vec<ContactRecord>>;

    async fn contact_count(&self) -> Result<u64>;

    // ========================================================================
    // Values
    // ========================================================================

    /// Upsert the value of `property` for `contact`. An existing binding
    /// keeps its id and creation history.
    ///
    /// Backends only verify that both ends exist, along with the option an
    /// `OptionRef` points at; type checking against the property belongs to
    /// the caller.
    async fn set_value(
        &self,
        contact: ContactId,
        property: PropertyId,
        value: PropertyValue,
        actor: Option<UserId>,
    ) -> Result<ContactProperty>;

    /// Remove a binding. Returns true if it existed.
    async fn remove_value(&self, contact: ContactId, property: PropertyId) -> Result<bool>;

    /// Delete every value held by a contact. Returns how many were removed.
    async fn delete_contact_values(&self, contact: ContactId) -> Result<u64>;

    /// Delete every value bound to a property. Returns how many were removed.
    async fn delete_property_values(&self, property: PropertyId) -> Result<u64>;

    async fn value_count(&self) -> Result<u64>;

    // ========================================================================
    // Cascading deletes
    // ========================================================================

    /// Delete a contact together with its values.
    ///
    /// Default: try the plain delete; on a dependency conflict remove the
    /// contact's values and retry exactly once. A second failure is returned.
    async fn cascade_delete_contact(&self, id: ContactId) -> Result<bool> {
        match self.delete_contact(id).await {
            Err(Error::DependencyConflict(reason)) => {
                tracing::warn!(contact = %id, %reason, "delete blocked by dependents, removing values and retrying");
                self.delete_contact_values(id).await?;
                self.delete_contact(id).await
            }
            other => other,
        }
    }

    /// Delete a property together with its options and bound values.
    ///
    /// Same retry-once contract as [`cascade_delete_contact`](Self::cascade_delete_contact).
    async fn cascade_delete_property(&self, id: PropertyId) -> Result<bool> {
        match self.delete_property(id).await {
            Err(Error::DependencyConflict(reason)) => {
                tracing::warn!(property = %id, %reason, "delete blocked by dependents, removing values and retrying");
                self.delete_property_values(id).await?;
                self.delete_property(id).await
            }
            other => other,
        }
    }
}
