//! # Filter Engine
//!
//! Turns untrusted query parameters into typed predicates over contact
//! records. Each property type has its own [`PropertyFilter`]; the
//! resolved property's type tag selects which one runs.
//!
//! ```text
//! ?first_name=john&department=it&search=dev
//!   first_name  → SinglelineFilter  (icontains on short text)
//!   department  → OptionFilter      (code == v  OR  value icontains v)
//!   search      → any value of any property
//!   all predicates AND together
//! ```
//!
//! Unknown slugs and "null" sentinel values drop out silently so that a
//! stray parameter can never fail a request.

use hashbrown::HashSet;

use crate::model::*;
use crate::query::{QueryParams, is_null_sentinel};
use crate::schema::Catalog;

// ============================================================================
// Needle
// ============================================================================

/// A query value prepared for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    raw: String,
    folded: String,
}

impl Needle {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let folded = raw.to_lowercase();
        Self { raw, folded }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Case-insensitive substring test.
    pub fn contained_in(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.folded)
    }

    /// Exact, case-sensitive equality.
    pub fn equals(&self, candidate: &str) -> bool {
        self.raw == candidate
    }
}

// ============================================================================
// Per-type filters
// ============================================================================

/// Match a stored value against a query value.
///
/// Implementations only look at their own value kind; any other kind is
/// a non-match.
pub trait PropertyFilter: Send + Sync {
    fn matches(&self, stored: &ResolvedValue<'_>, needle: &Needle) -> bool;
}

/// `singleline`: case-insensitive substring of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglelineFilter;

impl PropertyFilter for SinglelineFilter {
    fn matches(&self, stored: &ResolvedValue<'_>, needle: &Needle) -> bool {
        match stored {
            ResolvedValue::Text(text) => needle.contained_in(text),
            _ => false,
        }
    }
}

/// `textarea`: case-insensitive substring of the long text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextareaFilter;

impl PropertyFilter for TextareaFilter {
    fn matches(&self, stored: &ResolvedValue<'_>, needle: &Needle) -> bool {
        match stored {
            ResolvedValue::RichText(text) => needle.contained_in(text),
            _ => false,
        }
    }
}

/// `option`: exact code match OR case-insensitive substring of the label.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionFilter;

impl PropertyFilter for OptionFilter {
    fn matches(&self, stored: &ResolvedValue<'_>, needle: &Needle) -> bool {
        match stored {
            ResolvedValue::Option(opt) => needle.equals(&opt.code) || needle.contained_in(&opt.value),
            _ => false,
        }
    }
}

/// The filter for a property type.
pub fn filter_for(property_type: PropertyType) -> &'static dyn PropertyFilter {
    match property_type {
        PropertyType::Singleline => &SinglelineFilter,
        PropertyType::Textarea => &TextareaFilter,
        PropertyType::Option => &OptionFilter,
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// One compiled query condition.
#[derive(Debug, Clone)]
pub enum Predicate<'c> {
    /// `{slug}={value}` against one resolved property.
    Property { property: &'c Property, needle: Needle },
    /// `search={value}` across every value a contact holds.
    Search(Needle),
}

impl<'c> Predicate<'c> {
    pub fn matches(&self, catalog: &Catalog, record: &ContactRecord) -> bool {
        match self {
            Predicate::Property { property, needle } => {
                let Some(bound) = record.value_for(property.id) else {
                    return false;
                };
                let Some(resolved) = catalog.resolve(&bound.value) else {
                    return false;
                };
                filter_for(property.property_type).matches(&resolved, needle)
            }
            Predicate::Search(needle) => record
                .values
                .iter()
                .filter(|v| catalog.property(v.property).is_some())
                .filter_map(|v| catalog.resolve(&v.value))
                .any(|resolved| search_matches(&resolved, needle)),
        }
    }
}

/// Search semantics: text of either kind, or an option's display label.
/// Option codes are not searched.
fn search_matches(stored: &ResolvedValue<'_>, needle: &Needle) -> bool {
    match stored {
        ResolvedValue::Text(text) | ResolvedValue::RichText(text) => needle.contained_in(text),
        ResolvedValue::Option(opt) => needle.contained_in(&opt.value),
    }
}

// ============================================================================
// FilterSet
// ============================================================================

/// The AND of every predicate a query compiles to.
#[derive(Debug, Clone, Default)]
pub struct FilterSet<'c> {
    predicates: Vec<Predicate<'c>>,
}

impl<'c> FilterSet<'c> {
    /// Compile query parameters against the catalog.
    ///
    /// Reserved names other than `search` are skipped, as are sentinel
    /// values and slugs the catalog does not know.
    pub fn from_params(catalog: &'c Catalog, params: &QueryParams) -> Self {
        let mut predicates = Vec::new();

        if let Some(term) = params.filter_value("search") {
            predicates.push(Predicate::Search(Needle::new(term)));
        }

        for (name, value) in params.property_params() {
            if is_null_sentinel(value) {
                continue;
            }
            match catalog.find_property(name) {
                Some(property) => predicates.push(Predicate::Property {
                    property,
                    needle: Needle::new(value),
                }),
                None => tracing::debug!(param = name, "ignoring unknown filter parameter"),
            }
        }

        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate<'c>] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, catalog: &Catalog, record: &ContactRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(catalog, record))
    }

    /// Narrow `records` predicate by predicate. The result holds each
    /// contact at most once and keeps the input order.
    pub fn apply<'r, I>(&self, catalog: &Catalog, records: I) -> Vec<&'r ContactRecord>
    where
        I: IntoIterator<Item = &'r ContactRecord>,
    {
        let mut seen = HashSet::new();
        let mut current: Vec<&ContactRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.id()))
            .collect();

        for predicate in &self.predicates {
            current.retain(|r| predicate.matches(catalog, r));
        }
        current
    }
}

/// Filter a contact collection by query parameters.
pub fn apply_filters<'r>(
    catalog: &Catalog,
    records: &'r [ContactRecord],
    params: &QueryParams,
) -> Vec<&'r ContactRecord> {
    let filters = FilterSet::from_params(catalog, params);
    tracing::debug!(predicates = filters.predicates().len(), "applying contact filters");
    filters.apply(catalog, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(code: &str, value: &str) -> PropertyOption {
        PropertyOption::new(PropertyId::new(), code, value)
    }

    #[test]
    fn test_needle_case_insensitive() {
        let needle = Needle::new("JOHN");
        assert!(needle.contained_in("john"));
        assert!(needle.contained_in("Johnny"));
        assert!(!needle.contained_in("Jon"));
    }

    #[test]
    fn test_singleline_only_sees_text() {
        let needle = Needle::new("dev");
        assert!(SinglelineFilter.matches(&ResolvedValue::Text("Developer"), &needle));
        assert!(!SinglelineFilter.matches(&ResolvedValue::RichText("Developer"), &needle));
    }

    #[test]
    fn test_textarea_only_sees_rich_text() {
        let needle = Needle::new("years");
        assert!(TextareaFilter.matches(&ResolvedValue::RichText("5 years experience"), &needle));
        assert!(!TextareaFilter.matches(&ResolvedValue::Text("5 years"), &needle));
    }

    #[test]
    fn test_option_code_or_value() {
        let it = option("it", "IT Department");
        let stored = ResolvedValue::Option(&it);

        assert!(OptionFilter.matches(&stored, &Needle::new("it")));
        assert!(OptionFilter.matches(&stored, &Needle::new("IT Department")));
        assert!(OptionFilter.matches(&stored, &Needle::new("depart")));
        assert!(!OptionFilter.matches(&stored, &Needle::new("hr")));
    }

    #[test]
    fn test_option_code_is_exact() {
        let sales = option("SLS", "Sales");
        let stored = ResolvedValue::Option(&sales);
        // Code comparison is case-sensitive; the label still matches.
        assert!(OptionFilter.matches(&stored, &Needle::new("SLS")));
        assert!(!OptionFilter.matches(&stored, &Needle::new("sls")));
        assert!(OptionFilter.matches(&stored, &Needle::new("sales")));
    }

    #[test]
    fn test_option_label_substring_overlap() {
        // "active" is a substring of "Inactive": both match.
        let active = option("active", "Active");
        let inactive = option("inactive", "Inactive");
        let needle = Needle::new("active");
        assert!(OptionFilter.matches(&ResolvedValue::Option(&active), &needle));
        assert!(OptionFilter.matches(&ResolvedValue::Option(&inactive), &needle));
    }

    #[test]
    fn test_search_ignores_option_code() {
        let it = option("xyz", "IT Department");
        assert!(!search_matches(&ResolvedValue::Option(&it), &Needle::new("xyz")));
        assert!(search_matches(&ResolvedValue::Option(&it), &Needle::new("department")));
    }

    #[test]
    fn test_search_skips_values_of_unknown_properties() {
        let first = Property::new("first_name", "First Name", PropertyType::Singleline);
        let mut record = ContactRecord::new(Contact::new(ContactId::new()));
        for (n, (property, text)) in [(first.id, "Alice"), (PropertyId::new(), "Ghost")]
            .into_iter()
            .enumerate()
        {
            record.values.push(ContactProperty {
                id: ContactPropertyId(n as u64 + 1),
                contact: record.id(),
                property,
                value: PropertyValue::Text(text.into()),
                audit: Audit::now(None),
            });
        }
        let catalog = Catalog::new(vec![first], vec![]);

        assert!(Predicate::Search(Needle::new("alice")).matches(&catalog, &record));
        assert!(!Predicate::Search(Needle::new("ghost")).matches(&catalog, &record));
    }

    #[test]
    fn test_filter_set_skips_sentinels_and_unknown() {
        let first = Property::new("first_name", "First Name", PropertyType::Singleline);
        let catalog = Catalog::new(vec![first], vec![]);
        let params = QueryParams::parse(
            "first_name=null&foo=bar&search=NULL&page=2&display=first_name&last_name=",
        );
        assert!(FilterSet::from_params(&catalog, &params).is_empty());
    }

    #[test]
    fn test_apply_deduplicates_input() {
        let record = ContactRecord::new(Contact::new(ContactId::new()));
        let catalog = Catalog::default();
        let filters = FilterSet::default();
        let out = filters.apply(&catalog, [&record, &record]);
        assert_eq!(out.len(), 1);
    }
}
