//! # Projection Engine
//!
//! Shapes one output record per contact. The set of keys is decided at
//! request time by the `display` parameter:
//!
//! ```text
//! display=first_name,department
//!   → {"id": .., "created_at": .., "updated_at": ..,
//!      "first_name": "John",
//!      "department": {"code": "it", "value": "IT Department", "id": ".."}}
//! display absent → every registered slug
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use smallvec::SmallVec;

use crate::model::*;
use crate::query::QueryParams;
use crate::schema::Catalog;

/// Keys present on every projected record.
pub const FIXED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// One projected contact: an ordered JSON object.
pub type Record = Map<String, Json>;

// ============================================================================
// DisplaySpec
// ============================================================================

/// The slugs a client asked to see. Empty means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySpec {
    slugs: SmallVec<[String; 8]>,
}

impl DisplaySpec {
    /// Parse a comma-separated `display` value: entries are trimmed and
    /// empty entries dropped.
    pub fn parse(raw: Option<&str>) -> Self {
        let slugs = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self { slugs }
    }

    pub fn from_params(params: &QueryParams) -> Self {
        Self::parse(params.get("display"))
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.slugs.is_empty()
    }

    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }
}

// ============================================================================
// Projection
// ============================================================================

/// A display spec resolved against the catalog: the properties to render,
/// in output order.
#[derive(Debug, Clone)]
pub struct Projection<'c> {
    catalog: &'c Catalog,
    fields: Vec<&'c Property>,
}

impl<'c> Projection<'c> {
    /// Resolve requested slugs. Unknown slugs, repeats, and slugs that
    /// would shadow a fixed key are dropped.
    pub fn resolve(catalog: &'c Catalog, spec: &DisplaySpec) -> Self {
        let requested: Vec<&str> = if spec.is_all() {
            catalog.slugs()
        } else {
            spec.slugs().iter().map(String::as_str).collect()
        };

        let mut fields: Vec<&Property> = Vec::with_capacity(requested.len());
        for slug in requested {
            if FIXED_FIELDS.contains(&slug) {
                continue;
            }
            let Some(property) = catalog.find_property(slug) else {
                continue;
            };
            if !fields.iter().any(|f| f.id == property.id) {
                fields.push(property);
            }
        }

        Self { catalog, fields }
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|p| p.slug.as_str())
    }

    /// Render one contact.
    pub fn apply(&self, record: &ContactRecord) -> Record {
        let mut out = Map::with_capacity(FIXED_FIELDS.len() + self.fields.len());
        out.insert("id".into(), Json::String(record.contact.id.to_string()));
        out.insert("created_at".into(), Json::String(format_timestamp(record.contact.audit.created_at)));
        out.insert("updated_at".into(), Json::String(format_timestamp(record.contact.audit.updated_at)));

        for property in &self.fields {
            out.insert(property.slug.clone(), render_value(self.catalog, property, record));
        }
        out
    }
}

/// Project one contact onto the requested slugs (empty = all).
pub fn project(catalog: &Catalog, record: &ContactRecord, requested: &[&str]) -> Record {
    let spec = DisplaySpec {
        slugs: requested.iter().map(|s| (*s).to_owned()).collect(),
    };
    Projection::resolve(catalog, &spec).apply(record)
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the contact's value for `property`; `null` when absent or when
/// the stored kind does not fit the property type.
pub fn render_value(catalog: &Catalog, property: &Property, record: &ContactRecord) -> Json {
    record
        .value_for(property.id)
        .and_then(|bound| catalog.resolve(&bound.value))
        .filter(|resolved| resolved.property_type() == property.property_type)
        .map(render_resolved)
        .unwrap_or(Json::Null)
}

fn render_resolved(resolved: ResolvedValue<'_>) -> Json {
    match resolved {
        ResolvedValue::Text(s) | ResolvedValue::RichText(s) => Json::String(s.to_owned()),
        ResolvedValue::Option(opt) => render_option(opt),
    }
}

/// `{code, value, id}` for an option.
pub fn render_option(option: &PropertyOption) -> Json {
    json!({
        "code": option.code,
        "value": option.value,
        "id": option.id.to_string(),
    })
}

/// RFC 3339, UTC, microsecond precision, `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// Detail rendering
// ============================================================================

/// One held value with its property metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetail {
    pub property_name: String,
    pub property_slug: String,
    pub property_type: PropertyType,
    pub value: Json,
}

/// Every value the contact holds, in property registration order.
pub fn describe(catalog: &Catalog, record: &ContactRecord) -> Vec<PropertyDetail> {
    catalog
        .properties()
        .iter()
        .filter(|p| record.value_for(p.id).is_some())
        .map(|p| PropertyDetail {
            property_name: p.name.clone(),
            property_slug: p.slug.clone(),
            property_type: p.property_type,
            value: render_value(catalog, p, record),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bind(record: &mut ContactRecord, property: &Property, value: PropertyValue) {
        record.values.push(ContactProperty {
            id: ContactPropertyId(record.values.len() as u64 + 1),
            contact: record.id(),
            property: property.id,
            value,
            audit: Audit::now(None),
        });
    }

    fn fixture() -> (Catalog, ContactRecord, PropertyOption) {
        let first = Property::new("first_name", "First Name", PropertyType::Singleline);
        let notes = Property::new("notes", "Notes", PropertyType::Textarea);
        let dept = Property::new("department", "Department", PropertyType::Option);
        let it = PropertyOption::new(dept.id, "it", "IT Department");

        let mut record = ContactRecord::new(Contact::new(ContactId::new()));
        bind(&mut record, &first, PropertyValue::Text("John".into()));
        bind(&mut record, &dept, PropertyValue::OptionRef(it.id));

        let catalog = Catalog::new(vec![first, notes, dept], vec![it.clone()]);
        (catalog, record, it)
    }

    #[test]
    fn test_display_parse() {
        let spec = DisplaySpec::parse(Some(" first_name, ,last_name ,,"));
        assert_eq!(spec.slugs(), &["first_name".to_string(), "last_name".to_string()]);
        assert!(DisplaySpec::parse(Some(" , ")).is_all());
        assert!(DisplaySpec::parse(None).is_all());
    }

    #[test]
    fn test_default_projects_every_slug() {
        let (catalog, record, _) = fixture();
        let out = project(&catalog, &record, &[]);
        let keys: Vec<_> = out.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["id", "created_at", "updated_at", "first_name", "notes", "department"]
        );
        assert_eq!(out["notes"], Json::Null);
    }

    #[test]
    fn test_requested_order_and_unknown_dropped() {
        let (catalog, record, it) = fixture();
        let out = project(&catalog, &record, &["department", "bogus", "first_name", "department"]);
        let keys: Vec<_> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "created_at", "updated_at", "department", "first_name"]);
        assert_eq!(
            out["department"],
            json!({"code": "it", "value": "IT Department", "id": it.id.to_string()})
        );
        assert_eq!(out["first_name"], json!("John"));
    }

    #[test]
    fn test_fixed_keys_not_shadowed() {
        let id_prop = Property::new("id", "Shadow", PropertyType::Singleline);
        let catalog = Catalog::new(vec![id_prop], vec![]);
        let record = ContactRecord::new(Contact::new(ContactId::new()));
        let out = project(&catalog, &record, &["id"]);
        assert_eq!(out["id"], json!(record.id().to_string()));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_timestamp_format() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T12:30:45.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(ts), "2024-03-01T12:30:45.123456Z");
    }

    #[test]
    fn test_describe_lists_held_values() {
        let (catalog, record, _) = fixture();
        let details = describe(&catalog, &record);
        let slugs: Vec<_> = details.iter().map(|d| d.property_slug.as_str()).collect();
        assert_eq!(slugs, vec!["first_name", "department"]);
        assert_eq!(details[0].value, json!("John"));
        assert_eq!(details[1].property_type, PropertyType::Option);
        assert_eq!(details[1].value["code"], json!("it"));
    }
}
