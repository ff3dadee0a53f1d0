//! Schema export: serialize the registered properties and options as a
//! seed document.
//!
//! ```text
//! Directory schema → export_seed() → SeedDocument
//!   → write_seed_json() → property_contact.json
//!   → seed() on another directory
//! ```
//!
//! Contacts and their values are not exported.

use std::io::Write;

use crate::model::*;
use crate::seed::{SeedDocument, SeedOption, SeedProperty, SeedSettings};
use crate::storage::StorageBackend;
use crate::Result;

/// Build a seed document from the current schema, in registration order.
pub async fn export_seed<B: StorageBackend>(backend: &B) -> Result<SeedDocument> {
    let properties = backend.list_properties().await?;
    let mut contact = Vec::with_capacity(properties.len());

    for property in properties {
        let settings = if property.is_option() {
            let options = backend.list_options(property.id).await?;
            Some(SeedSettings {
                options: options.into_iter().map(seed_option).collect(),
            })
        } else {
            None
        };

        contact.push(SeedProperty {
            slug: property.slug,
            name: property.name,
            property_type: property.property_type,
            settings,
        });
    }

    Ok(SeedDocument { contact })
}

/// Write the schema as pretty-printed seed JSON.
pub async fn write_seed_json<B: StorageBackend>(backend: &B, writer: &mut dyn Write) -> Result<()> {
    let doc = export_seed(backend).await?;
    serde_json::to_writer_pretty(&mut *writer, &doc)?;
    writeln!(writer)?;
    Ok(())
}

fn seed_option(option: PropertyOption) -> SeedOption {
    SeedOption {
        value: option.code,
        name: option.value,
    }
}
