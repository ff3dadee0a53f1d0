//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It uses simple HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No persistence**: everything is lost when the backend is dropped.
//! - **Per-collection locks**: a multi-step administrative operation
//!   (e.g. cascade delete) is not atomic across collections. Every single
//!   call is.
//!
//! ## Lock order
//!
//! `values`, then `properties`, then `options`, then `contacts`. Restricted
//! deletes and `set_value` hold `values` for writing across their check and
//! their change, so a binding can never appear for a row being deleted.
//! - **No secondary indexes beyond the uniqueness keys**: listing scans
//!   all contacts.
//!
//! Use this backend for:
//! - Testing the filter, projection and listing engines
//! - Embedding the directory in applications that don't need persistence

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::StorageBackend;
use crate::model::*;
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory directory storage. Cloning shares the same tables.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    /// Registration order is the vector order.
    properties: RwLock<Vec<Property>>,
    options: RwLock<HashMap<OptionId, PropertyOption>>,
    contacts: RwLock<ContactTable>,
    values: RwLock<ValueTable>,
    next_value_id: AtomicU64,
}

#[derive(Default)]
struct ContactTable {
    rows: HashMap<ContactId, Contact>,
    /// creation order
    order: Vec<ContactId>,
}

#[derive(Default)]
struct ValueTable {
    rows: HashMap<ContactPropertyId, ContactProperty>,
    /// (contact, property) → binding; the uniqueness key
    by_key: HashMap<(ContactId, PropertyId), ContactPropertyId>,
    /// contact → bindings in insertion order
    by_contact: HashMap<ContactId, Vec<ContactPropertyId>>,
}

impl ValueTable {
    fn remove(&mut self, id: ContactPropertyId) -> Option<ContactProperty> {
        let row = self.rows.remove(&id)?;
        self.by_key.remove(&(row.contact, row.property));
        if let Some(ids) = self.by_contact.get_mut(&row.contact) {
            ids.retain(|vid| *vid != id);
            if ids.is_empty() {
                self.by_contact.remove(&row.contact);
            }
        }
        Some(row)
    }

    fn option_usage(&self, option: OptionId) -> u64 {
        self.rows.values().filter(|v| v.references_option(option)).count() as u64
    }

    fn for_contact(&self, contact: ContactId) -> Vec<ContactProperty> {
        self.by_contact
            .get(&contact)
            .map(|ids| ids.iter().filter_map(|id| self.rows.get(id).cloned()).collect())
            .unwrap_or_default()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                properties: RwLock::new(Vec::new()),
                options: RwLock::new(HashMap::new()),
                contacts: RwLock::new(ContactTable::default()),
                values: RwLock::new(ValueTable::default()),
                next_value_id: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    // ========================================================================
    // Properties
    // ========================================================================

    async fn insert_property(&self, property: Property) -> Result<()> {
        let mut props = self.inner.properties.write();
        if props
            .iter()
            .any(|p| p.slug == property.slug && p.property_type == property.property_type)
        {
            return Err(Error::ConstraintViolation(format!(
                "Property with slug '{}' and type '{}' already exists",
                property.slug, property.property_type
            )));
        }
        props.push(property);
        Ok(())
    }

    async fn update_property(&self, property: Property) -> Result<()> {
        let mut props = self.inner.properties.write();
        if props.iter().any(|p| {
            p.id != property.id
                && p.slug == property.slug
                && p.property_type == property.property_type
        }) {
            return Err(Error::ConstraintViolation(format!(
                "Property with slug '{}' and type '{}' already exists",
                property.slug, property.property_type
            )));
        }
        let slot = props
            .iter_mut()
            .find(|p| p.id == property.id)
            .ok_or_else(|| Error::NotFound(format!("Property {}", property.id)))?;
        *slot = property;
        Ok(())
    }

    async fn get_property(&self, id: PropertyId) -> Result<Option<Property>> {
        Ok(self.inner.properties.read().iter().find(|p| p.id == id).cloned())
    }

    async fn list_properties(&self) -> Result<Vec<Property>> {
        Ok(self.inner.properties.read().clone())
    }

    async fn delete_property(&self, id: PropertyId) -> Result<bool> {
        // Restrict: bound values must go first
        let values = self.inner.values.write();
        let bound = values.rows.values().filter(|v| v.property == id).count();
        if bound > 0 {
            return Err(Error::DependencyConflict(format!(
                "Property {id} is bound by {bound} contact values"
            )));
        }

        let mut props = self.inner.properties.write();
        let before = props.len();
        props.retain(|p| p.id != id);
        let removed = props.len() != before;

        if removed {
            self.inner.options.write().retain(|_, o| o.property != id);
        }
        Ok(removed)
    }

    // ========================================================================
    // Options
    // ========================================================================

    async fn insert_option(&self, option: PropertyOption) -> Result<()> {
        let props = self.inner.properties.read();
        if !props.iter().any(|p| p.id == option.property) {
            return Err(Error::NotFound(format!("Property {}", option.property)));
        }

        let mut options = self.inner.options.write();
        if options
            .values()
            .any(|o| o.property == option.property && o.code == option.code)
        {
            return Err(Error::ConstraintViolation(format!(
                "Option with code '{}' already exists for property {}",
                option.code, option.property
            )));
        }
        options.insert(option.id, option);
        Ok(())
    }

    async fn update_option(&self, option: PropertyOption) -> Result<()> {
        let mut options = self.inner.options.write();
        if options
            .values()
            .any(|o| o.id != option.id && o.property == option.property && o.code == option.code)
        {
            return Err(Error::ConstraintViolation(format!(
                "Option with code '{}' already exists for property {}",
                option.code, option.property
            )));
        }
        let slot = options
            .get_mut(&option.id)
            .ok_or_else(|| Error::NotFound(format!("Option {}", option.id)))?;
        *slot = option;
        Ok(())
    }

    async fn get_option(&self, id: OptionId) -> Result<Option<PropertyOption>> {
        Ok(self.inner.options.read().get(&id).cloned())
    }

    async fn list_options(&self, property: PropertyId) -> Result<Vec<PropertyOption>> {
        let mut opts: Vec<PropertyOption> = self
            .inner
            .options
            .read()
            .values()
            .filter(|o| o.property == property)
            .cloned()
            .collect();
        sort_options(&mut opts);
        Ok(opts)
    }

    async fn all_options(&self) -> Result<Vec<PropertyOption>> {
        Ok(self.inner.options.read().values().cloned().collect())
    }

    async fn delete_option(&self, id: OptionId) -> Result<bool> {
        let values = self.inner.values.write();
        let usage = values.option_usage(id);
        if usage > 0 {
            return Err(Error::DependencyConflict(format!(
                "Option {id} is referenced by {usage} contact values"
            )));
        }
        Ok(self.inner.options.write().remove(&id).is_some())
    }

    async fn option_usage(&self, id: OptionId) -> Result<u64> {
        Ok(self.inner.values.read().option_usage(id))
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    async fn insert_contact(&self, contact: Contact) -> Result<()> {
        let mut contacts = self.inner.contacts.write();
        if contacts.rows.contains_key(&contact.id) {
            return Err(Error::ConstraintViolation(format!(
                "Contact {} already exists",
                contact.id
            )));
        }
        contacts.order.push(contact.id);
        contacts.rows.insert(contact.id, contact);
        Ok(())
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<ContactRecord>> {
        let values = self.inner.values.read();
        let contacts = self.inner.contacts.read();
        Ok(contacts.rows.get(&id).map(|contact| ContactRecord {
            contact: contact.clone(),
            values: values.for_contact(id),
        }))
    }

    async fn touch_contact(&self, id: ContactId, actor: Option<UserId>) -> Result<()> {
        let mut contacts = self.inner.contacts.write();
        let contact = contacts
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Contact {id}")))?;
        contact.audit.touch(actor);
        Ok(())
    }

    async fn delete_contact(&self, id: ContactId) -> Result<bool> {
        // Restrict: held values must go first
        let values = self.inner.values.write();
        if let Some(ids) = values.by_contact.get(&id) {
            if !ids.is_empty() {
                return Err(Error::DependencyConflict(format!(
                    "Contact {id} still holds {} values",
                    ids.len()
                )));
            }
        }

        let mut contacts = self.inner.contacts.write();
        let removed = contacts.rows.remove(&id);
        if removed.is_some() {
            contacts.order.retain(|cid| *cid != id);
        }
        Ok(removed.is_some())
    }

    async fn all_contacts(&self) -> Result<Vec<ContactRecord>> {
        let values = self.inner.values.read();
        let contacts = self.inner.contacts.read();

        Ok(contacts
            .order
            .iter()
            .filter_map(|id| contacts.rows.get(id))
            .map(|contact| ContactRecord {
                contact: contact.clone(),
                values: values.for_contact(contact.id),
            })
            .collect())
    }

    async fn contact_count(&self) -> Result<u64> {
        Ok(self.inner.contacts.read().rows.len() as u64)
    }

    // ========================================================================
    // Values
    // ========================================================================

    async fn set_value(
        &self,
        contact: ContactId,
        property: PropertyId,
        value: PropertyValue,
        actor: Option<UserId>,
    ) -> Result<ContactProperty> {
        // Everything the binding points at must exist while `values` is held
        let mut values = self.inner.values.write();
        if !self.inner.properties.read().iter().any(|p| p.id == property) {
            return Err(Error::NotFound(format!("Property {property}")));
        }
        if let Some(option) = value.as_option() {
            if !self.inner.options.read().contains_key(&option) {
                return Err(Error::NotFound(format!("Option {option}")));
            }
        }
        if !self.inner.contacts.read().rows.contains_key(&contact) {
            return Err(Error::NotFound(format!("Contact {contact}")));
        }

        if let Some(existing) = values.by_key.get(&(contact, property)).copied() {
            let row = values
                .rows
                .get_mut(&existing)
                .ok_or_else(|| Error::StorageError(format!("dangling value index {existing}")))?;
            row.value = value;
            row.audit.touch(actor);
            return Ok(row.clone());
        }

        let id = ContactPropertyId(self.inner.next_value_id.fetch_add(1, Ordering::Relaxed));
        let row = ContactProperty {
            id,
            contact,
            property,
            value,
            audit: Audit::now(actor),
        };
        values.by_key.insert((contact, property), id);
        values.by_contact.entry(contact).or_default().push(id);
        values.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn remove_value(&self, contact: ContactId, property: PropertyId) -> Result<bool> {
        let mut values = self.inner.values.write();
        let Some(id) = values.by_key.get(&(contact, property)).copied() else {
            return Ok(false);
        };
        Ok(values.remove(id).is_some())
    }

    async fn delete_contact_values(&self, contact: ContactId) -> Result<u64> {
        let mut values = self.inner.values.write();
        let ids = values.by_contact.get(&contact).cloned().unwrap_or_default();
        let mut removed = 0;
        for id in ids {
            if values.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_property_values(&self, property: PropertyId) -> Result<u64> {
        let mut values = self.inner.values.write();
        let ids: Vec<ContactPropertyId> = values
            .rows
            .values()
            .filter(|v| v.property == property)
            .map(|v| v.id)
            .collect();
        let mut removed = 0;
        for id in ids {
            if values.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn value_count(&self) -> Result<u64> {
        Ok(self.inner.values.read().rows.len() as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
