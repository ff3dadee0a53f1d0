//! Seed documents: property and option definitions loaded at startup.
//!
//! ```json
//! {"contact": [
//!   {"slug": "department", "name": "Department", "type": "option",
//!    "settings": {"options": [{"value": "it", "name": "IT Department"}]}}
//! ]}
//! ```
//!
//! Seeding is get-or-create: properties match by slug, options by
//! `(property, code)`, so applying the same document twice changes nothing.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::admin::{NewOption, NewProperty};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Directory, Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub contact: Vec<SeedProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedProperty {
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SeedSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSettings {
    #[serde(default)]
    pub options: Vec<SeedOption>,
}

/// `value` is the option code, `name` its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOption {
    pub value: String,
    pub name: String,
}

impl SeedDocument {
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// What a seeding run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub created_properties: usize,
    pub created_options: usize,
}

impl<B: StorageBackend> Directory<B> {
    /// Apply a seed document. With `reset`, every existing property (with its
    /// options and values) is deleted first.
    pub async fn seed(&self, doc: &SeedDocument, reset: bool, actor: Option<UserId>) -> Result<SeedReport> {
        if reset {
            let existing = self.backend.list_properties().await?;
            tracing::warn!(properties = existing.len(), "resetting schema before seeding");
            for property in existing {
                self.backend.cascade_delete_property(property.id).await?;
            }
        }

        let mut report = SeedReport::default();
        for entry in &doc.contact {
            let property = match self.backend.get_property_by_slug(&entry.slug).await {
                Ok(found) => {
                    tracing::debug!(slug = %found.slug, "property already exists");
                    found
                }
                Err(Error::NotFound(_)) => {
                    report.created_properties += 1;
                    let input = NewProperty::new(&entry.name, entry.property_type).with_slug(&entry.slug);
                    self.create_property(input, actor).await?
                }
                Err(e) => return Err(e),
            };

            let Some(settings) = &entry.settings else { continue };
            if settings.options.is_empty() {
                continue;
            }
            if !property.is_option() {
                tracing::warn!(slug = %property.slug, kind = %property.property_type, "ignoring options for non-option property");
                continue;
            }

            let existing = self.backend.list_options(property.id).await?;
            for (idx, option) in settings.options.iter().enumerate() {
                if existing.iter().any(|o| o.code == option.value) {
                    continue;
                }
                let input = NewOption::new(&option.name)
                    .with_code(&option.value)
                    .with_order(idx as u32);
                self.add_option(property.id, input).await?;
                report.created_options += 1;
            }
        }

        tracing::info!(
            properties = report.created_properties,
            options = report.created_options,
            "seeded schema"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"contact": [
        {"slug": "first_name", "name": "First Name", "type": "singleline"},
        {"slug": "status", "name": "Status", "type": "option",
         "settings": {"options": [
            {"value": "active", "name": "Active"},
            {"value": "inactive", "name": "Inactive"}
         ]}}
    ]}"#;

    #[test]
    fn test_parse_document() {
        let doc = SeedDocument::from_json(DOC).unwrap();
        assert_eq!(doc.contact.len(), 2);
        assert_eq!(doc.contact[1].property_type, PropertyType::Option);
        assert_eq!(doc.contact[1].settings.as_ref().unwrap().options[1].name, "Inactive");
        assert!(SeedDocument::from_json("{\"contact\": [{\"slug\": 1}]}").is_err());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let dir = Directory::open_memory();
        let doc = SeedDocument::from_json(DOC).unwrap();

        let first = dir.seed(&doc, false, None).await.unwrap();
        assert_eq!(first, SeedReport { created_properties: 2, created_options: 2 });

        let second = dir.seed(&doc, false, None).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let status = dir.backend().get_property_by_slug("status").await.unwrap();
        let options = dir.list_options(status.id).await.unwrap();
        let labels: Vec<_> = options.iter().map(|o| (o.code.as_str(), o.value.as_str(), o.order)).collect();
        assert_eq!(labels, vec![("active", "Active", 0), ("inactive", "Inactive", 1)]);
    }

    #[tokio::test]
    async fn test_reset_recreates() {
        let dir = Directory::open_memory();
        let doc = SeedDocument::from_json(DOC).unwrap();
        dir.seed(&doc, false, None).await.unwrap();

        let contact = dir.create_contact(None).await.unwrap();
        dir.set_value_by_slug(contact.id, "status", "active", None).await.unwrap();

        let report = dir.seed(&doc, true, None).await.unwrap();
        assert_eq!(report.created_properties, 2);
        assert_eq!(dir.backend().value_count().await.unwrap(), 0);
    }
}
