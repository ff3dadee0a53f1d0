//! # contacts-eav: Entity-Attribute-Value Contact Directory
//!
//! Contacts carry no columns of their own. Every attribute is a registered
//! [`Property`] and every datum a typed [`ContactProperty`] binding, so the
//! schema grows at runtime without migrations.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the engine and storage
//! 2. **Typed values**: `PropertyValue` is a sum type, one variant per property type
//! 3. **Pure query path**: filtering and projection are functions of a snapshot
//! 4. **Permissive input**: unknown parameters are ignored, never rejected
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contacts_eav::{Directory, NewProperty, PropertyType, PropertyValue, QueryParams};
//!
//! # async fn example() -> contacts_eav::Result<()> {
//! let dir = Directory::open_memory();
//!
//! let first = dir.create_property(NewProperty::new("First Name", PropertyType::Singleline), None).await?;
//! let contact = dir.create_contact(None).await?;
//! dir.set_value(contact.id, first.id, PropertyValue::Text("John".into()), None).await?;
//!
//! let page = dir.list(&QueryParams::parse("first_name=john&display=first_name")).await?;
//! assert_eq!(page.page_info.count, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Query Parameters
//!
//! | Parameter | Meaning |
//! |-----------|---------|
//! | `search` | Substring across every value of every property |
//! | `display` | Comma-separated slugs to project (default: all) |
//! | `page` / `page_size` | 1-based page, size capped at 100 |
//! | `{slug}` | Type-aware filter on one property |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod schema;
pub mod storage;
pub mod query;
pub mod filter;
pub mod projection;
pub mod listing;
pub mod admin;
pub mod seed;
pub mod export;
pub mod ratelimit;
pub mod config;
#[cfg(feature = "server")]
pub mod http;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Audit, Contact, ContactId, ContactProperty, ContactPropertyId, ContactRecord,
    OptionId, Property, PropertyId, PropertyOption, PropertyType, PropertyValue, UserId,
};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use schema::Catalog;
pub use storage::{MemoryBackend, StorageBackend};
pub use query::QueryParams;
pub use filter::{FilterSet, PropertyFilter, apply_filters};
pub use projection::{DisplaySpec, Projection, PropertyDetail, Record, project};
pub use listing::{Listing, PageInfo, PageResponse};
pub use admin::{NewOption, NewProperty, OptionPatch, PropertyPatch};
pub use ratelimit::{Decision, MemoryRateStore, RateLimitRule, RateLimitStore, RateLimiter};
pub use config::Config;

// ============================================================================
// Top-level Directory handle
// ============================================================================

/// The primary entry point. A `Directory` wraps a storage backend and
/// serves listings, details and administrative mutations.
pub struct Directory<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> Directory<B> {
    /// Create a Directory with the given backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// List contacts: filter → paginate → project.
    pub async fn list(&self, params: &QueryParams) -> Result<Listing> {
        // One snapshot per request
        let catalog = self.backend.catalog().await?;
        let records = self.backend.all_contacts().await?;
        Ok(listing::list(&catalog, &records, params))
    }

    /// One contact with every value it holds.
    pub async fn detail(&self, id: ContactId) -> Result<ContactDetail> {
        let record = self
            .backend
            .get_contact(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Contact {id}")))?;
        let catalog = self.backend.catalog().await?;

        Ok(ContactDetail {
            id: record.contact.id,
            created_at: projection::format_timestamp(record.contact.audit.created_at),
            updated_at: projection::format_timestamp(record.contact.audit.updated_at),
            properties: projection::describe(&catalog, &record),
        })
    }

    /// Schema snapshot.
    pub async fn catalog(&self) -> Result<Catalog> {
        self.backend.catalog().await
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// In-memory directory for testing and embedding.
impl Directory<MemoryBackend> {
    pub fn open_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }
}

impl<B: StorageBackend + Clone> Clone for Directory<B> {
    fn clone(&self) -> Self {
        Self { backend: self.backend.clone() }
    }
}

/// Detail view of one contact.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContactDetail {
    pub id: ContactId,
    pub created_at: String,
    pub updated_at: String,
    pub properties: Vec<PropertyDetail>,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Dependency conflict: {0}")]
    DependencyConflict(String),

    #[error("Cannot delete option \"{value}\" because it is used by {usages} contacts")]
    OptionInUse { value: String, usages: u64 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
