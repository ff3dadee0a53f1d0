//! Administrative mutations.
//!
//! Every write that reaches the store goes through here, and every
//! invariant of the data model is checked here first:
//!
//! - a property's slug is normalised, and `(slug, type)` stays unique
//! - options attach only to option-typed properties and carry a label
//! - a value's kind matches its property's type; option values point at
//!   an option of that same property
//! - an option still referenced by a contact cannot be deleted
//! - contact and property deletes cascade to their values

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Directory, Error, Result};

// ============================================================================
// Inputs
// ============================================================================

/// A property to register. The slug is derived from the name when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProperty {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
}

impl NewProperty {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            slug: None,
            property_type,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// Changes to a property. The type is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// An option to add. The code is derived from the value when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOption {
    #[serde(default)]
    pub code: Option<String>,
    pub value: String,
    #[serde(default)]
    pub order: u32,
}

impl NewOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            code: None,
            value: value.into(),
            order: 0,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// Changes to an option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPatch {
    pub code: Option<String>,
    pub value: Option<String>,
    pub order: Option<u32>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::ValidationError(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_owned())
}

/// A given slug must already be an identifier; a derived one is normalised.
fn resolve_slug(slug: Option<&str>, name: &str) -> Result<String> {
    let slug = match slug.map(str::trim) {
        Some(s) if !s.is_empty() => {
            if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                return Err(Error::ValidationError(format!(
                    "slug '{s}' may only contain letters, digits, '_' and '-'"
                )));
            }
            s.to_owned()
        }
        _ => slugify(name),
    };
    if slug.is_empty() {
        return Err(Error::ValidationError("slug must not be empty".into()));
    }
    Ok(slug)
}

fn resolve_code(code: Option<&str>, value: &str) -> String {
    match code.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_owned(),
        _ => slugify(value),
    }
}

// ============================================================================
// Directory: administrative surface
// ============================================================================

impl<B: StorageBackend> Directory<B> {
    // ========================================================================
    // Properties
    // ========================================================================

    pub async fn create_property(&self, input: NewProperty, actor: Option<UserId>) -> Result<Property> {
        let name = require_text("name", &input.name)?;
        let slug = resolve_slug(input.slug.as_deref(), &name)?;

        let property = Property {
            id: PropertyId::new(),
            slug,
            name,
            property_type: input.property_type,
            audit: Audit::now(actor),
        };
        self.backend.insert_property(property.clone()).await?;

        tracing::info!(property = %property.id, slug = %property.slug, kind = %property.property_type, "created property");
        Ok(property)
    }

    pub async fn update_property(
        &self,
        id: PropertyId,
        patch: PropertyPatch,
        actor: Option<UserId>,
    ) -> Result<Property> {
        let mut property = self.property(id).await?;
        if let Some(name) = patch.name {
            property.name = require_text("name", &name)?;
        }
        if let Some(slug) = patch.slug {
            property.slug = resolve_slug(Some(&slug), &property.name)?;
        }
        property.audit.touch(actor);
        self.backend.update_property(property.clone()).await?;

        tracing::info!(property = %id, slug = %property.slug, "updated property");
        Ok(property)
    }

    pub async fn property(&self, id: PropertyId) -> Result<Property> {
        self.backend
            .get_property(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Property {id}")))
    }

    pub async fn list_properties(&self) -> Result<Vec<Property>> {
        self.backend.list_properties().await
    }

    /// Delete a property, its options and every value bound to it.
    pub async fn delete_property(&self, id: PropertyId) -> Result<bool> {
        let deleted = self.backend.cascade_delete_property(id).await?;
        if deleted {
            tracing::info!(property = %id, "deleted property");
        }
        Ok(deleted)
    }

    // ========================================================================
    // Options
    // ========================================================================

    pub async fn add_option(&self, property: PropertyId, input: NewOption) -> Result<PropertyOption> {
        let owner = self.property(property).await?;
        if !owner.is_option() {
            return Err(Error::ValidationError(format!(
                "property '{}' is of type {}; options require type option",
                owner.slug, owner.property_type
            )));
        }

        let value = require_text("value", &input.value)?;
        let code = resolve_code(input.code.as_deref(), &value);
        let option = PropertyOption {
            id: OptionId::new(),
            property,
            code,
            value,
            order: input.order,
        };
        self.backend.insert_option(option.clone()).await?;

        tracing::info!(property = %owner.slug, code = %option.code, "added option");
        Ok(option)
    }

    pub async fn update_option(&self, id: OptionId, patch: OptionPatch) -> Result<PropertyOption> {
        let mut option = self.option(id).await?;
        if let Some(value) = patch.value {
            option.value = require_text("value", &value)?;
        }
        if let Some(code) = patch.code {
            option.code = resolve_code(Some(&code), &option.value);
        }
        if let Some(order) = patch.order {
            option.order = order;
        }
        self.backend.update_option(option.clone()).await?;
        Ok(option)
    }

    pub async fn option(&self, id: OptionId) -> Result<PropertyOption> {
        self.backend
            .get_option(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Option {id}")))
    }

    pub async fn list_options(&self, property: PropertyId) -> Result<Vec<PropertyOption>> {
        self.backend.list_options(property).await
    }

    /// How many contacts use the option.
    pub async fn option_usage(&self, id: OptionId) -> Result<u64> {
        self.backend.option_usage(id).await
    }

    /// Delete an option nobody references. A referenced option is refused
    /// with [`Error::OptionInUse`] and left untouched.
    pub async fn delete_option(&self, id: OptionId) -> Result<bool> {
        let Some(option) = self.backend.get_option(id).await? else {
            return Ok(false);
        };
        let usages = self.backend.option_usage(id).await?;
        if usages > 0 {
            return Err(Error::OptionInUse { value: option.value, usages });
        }
        self.backend.delete_option(id).await
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    pub async fn create_contact(&self, actor: Option<UserId>) -> Result<Contact> {
        let contact = Contact {
            id: ContactId::new(),
            audit: Audit::now(actor),
        };
        self.backend.insert_contact(contact.clone()).await?;
        Ok(contact)
    }

    pub async fn contact(&self, id: ContactId) -> Result<ContactRecord> {
        self.backend
            .get_contact(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Contact {id}")))
    }

    /// Delete a contact and every value it holds.
    pub async fn delete_contact(&self, id: ContactId) -> Result<bool> {
        let deleted = self.backend.cascade_delete_contact(id).await?;
        if deleted {
            tracing::info!(contact = %id, "deleted contact");
        }
        Ok(deleted)
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Bind `value` to `contact` for `property`, replacing any previous
    /// value of that property.
    pub async fn set_value(
        &self,
        contact: ContactId,
        property: PropertyId,
        value: PropertyValue,
        actor: Option<UserId>,
    ) -> Result<ContactProperty> {
        let owner = self.property(property).await?;
        self.check_value(&owner, &value).await?;

        let bound = self.backend.set_value(contact, property, value, actor).await?;
        self.backend.touch_contact(contact, actor).await?;
        Ok(bound)
    }

    /// Bind a raw text value by slug, interpreting it per the property type.
    /// For option properties `raw` is an option code, or else an exact
    /// option label.
    pub async fn set_value_by_slug(
        &self,
        contact: ContactId,
        slug: &str,
        raw: &str,
        actor: Option<UserId>,
    ) -> Result<ContactProperty> {
        let owner = self.backend.get_property_by_slug(slug).await?;
        let value = match owner.property_type {
            PropertyType::Singleline => PropertyValue::Text(raw.to_owned()),
            PropertyType::Textarea => PropertyValue::RichText(raw.to_owned()),
            PropertyType::Option => {
                let options = self.backend.list_options(owner.id).await?;
                let chosen = options
                    .iter()
                    .find(|o| o.code == raw)
                    .or_else(|| options.iter().find(|o| o.value == raw))
                    .ok_or_else(|| Error::NotFound(format!("Option '{raw}' of property '{slug}'")))?;
                PropertyValue::OptionRef(chosen.id)
            }
        };
        self.set_value(contact, owner.id, value, actor).await
    }

    pub async fn remove_value(
        &self,
        contact: ContactId,
        property: PropertyId,
        actor: Option<UserId>,
    ) -> Result<bool> {
        let removed = self.backend.remove_value(contact, property).await?;
        if removed {
            self.backend.touch_contact(contact, actor).await?;
        }
        Ok(removed)
    }

    async fn check_value(&self, owner: &Property, value: &PropertyValue) -> Result<()> {
        if value.property_type() != owner.property_type {
            return Err(Error::TypeError {
                expected: owner.property_type.to_string(),
                got: value.type_name().to_string(),
            });
        }
        if let PropertyValue::OptionRef(id) = value {
            let option = self.option(*id).await?;
            if option.property != owner.id {
                return Err(Error::ValidationError(format!(
                    "option '{}' does not belong to property '{}'",
                    option.code, owner.slug
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug(None, "First Name").unwrap(), "first_name");
        assert_eq!(resolve_slug(Some("  "), "Email").unwrap(), "email");
        assert_eq!(resolve_slug(Some("job-title"), "Job Title").unwrap(), "job-title");
        assert!(resolve_slug(Some("bad slug"), "x").is_err());
    }

    #[test]
    fn test_resolve_code() {
        assert_eq!(resolve_code(None, "IT Department"), "it_department");
        assert_eq!(resolve_code(Some("it"), "IT Department"), "it");
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("name", "   ").is_err());
        assert_eq!(require_text("name", " Email ").unwrap(), "Email");
    }

    #[tokio::test]
    async fn test_value_kind_must_match() {
        let dir = Directory::open_memory();
        let first = dir
            .create_property(NewProperty::new("First Name", PropertyType::Singleline), None)
            .await
            .unwrap();
        let contact = dir.create_contact(None).await.unwrap();

        let err = dir
            .set_value(contact.id, first.id, PropertyValue::RichText("x".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TypeError { .. }));
    }

    #[tokio::test]
    async fn test_option_must_belong_to_property() {
        let dir = Directory::open_memory();
        let dept = dir
            .create_property(NewProperty::new("Department", PropertyType::Option), None)
            .await
            .unwrap();
        let status = dir
            .create_property(NewProperty::new("Status", PropertyType::Option), None)
            .await
            .unwrap();
        let active = dir.add_option(status.id, NewOption::new("Active")).await.unwrap();
        let contact = dir.create_contact(None).await.unwrap();

        let err = dir
            .set_value(contact.id, dept.id, PropertyValue::OptionRef(active.id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_options_only_on_option_properties() {
        let dir = Directory::open_memory();
        let email = dir
            .create_property(NewProperty::new("Email", PropertyType::Singleline), None)
            .await
            .unwrap();
        let err = dir.add_option(email.id, NewOption::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }
}
