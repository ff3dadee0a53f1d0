//! # Schema Store snapshot
//!
//! A [`Catalog`] is a consistent, read-only view of every registered
//! property and option, taken once per request. Filtering and projection
//! resolve slugs and option references against it, so a property's type
//! cannot change underneath a request that is already running.

use hashbrown::HashMap;

use crate::model::*;
use crate::{Error, Result};

/// Registered properties and options, indexed for lookup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Registration order.
    properties: Vec<Property>,
    /// slug → index into `properties`; the earliest registration wins.
    by_slug: HashMap<String, usize>,
    by_id: HashMap<PropertyId, usize>,
    options: HashMap<OptionId, PropertyOption>,
    /// property → option ids in `(order, value)` order
    options_by_property: HashMap<PropertyId, Vec<OptionId>>,
}

impl Catalog {
    /// Build a catalog. `properties` must already be in registration order.
    pub fn new(properties: Vec<Property>, options: Vec<PropertyOption>) -> Self {
        let mut by_slug = HashMap::with_capacity(properties.len());
        let mut by_id = HashMap::with_capacity(properties.len());
        for (idx, prop) in properties.iter().enumerate() {
            by_slug.entry(prop.slug.clone()).or_insert(idx);
            by_id.insert(prop.id, idx);
        }

        let mut grouped: HashMap<PropertyId, Vec<PropertyOption>> = HashMap::new();
        for opt in &options {
            grouped.entry(opt.property).or_default().push(opt.clone());
        }
        let options_by_property = grouped
            .into_iter()
            .map(|(pid, mut opts)| {
                sort_options(&mut opts);
                (pid, opts.into_iter().map(|o| o.id).collect())
            })
            .collect();

        Self {
            properties,
            by_slug,
            by_id,
            options: options.into_iter().map(|o| (o.id, o)).collect(),
            options_by_property,
        }
    }

    /// Resolve a slug. Callers in the query path treat `NotFound` as
    /// "ignore this parameter".
    pub fn property_by_slug(&self, slug: &str) -> Result<&Property> {
        self.find_property(slug)
            .ok_or_else(|| Error::NotFound(format!("Property '{slug}'")))
    }

    pub fn find_property(&self, slug: &str) -> Option<&Property> {
        self.by_slug.get(slug).map(|&idx| &self.properties[idx])
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.by_id.get(&id).map(|&idx| &self.properties[idx])
    }

    /// All properties in registration order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Distinct slugs in registration order.
    pub fn slugs(&self) -> Vec<&str> {
        self.properties
            .iter()
            .enumerate()
            .filter(|(idx, p)| self.by_slug.get(&p.slug) == Some(idx))
            .map(|(_, p)| p.slug.as_str())
            .collect()
    }

    /// Options of `property` ordered by `(order, value)`.
    pub fn options(&self, property: PropertyId) -> Vec<&PropertyOption> {
        self.options_by_property
            .get(&property)
            .map(|ids| ids.iter().filter_map(|id| self.options.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn option(&self, id: OptionId) -> Option<&PropertyOption> {
        self.options.get(&id)
    }

    /// Resolve a stored value against the schema. A dangling option
    /// reference resolves to `None`.
    pub fn resolve<'a>(&'a self, value: &'a PropertyValue) -> Option<ResolvedValue<'a>> {
        match value {
            PropertyValue::Text(s) => Some(ResolvedValue::Text(s)),
            PropertyValue::RichText(s) => Some(ResolvedValue::RichText(s)),
            PropertyValue::OptionRef(id) => self.option(*id).map(ResolvedValue::Option),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
