//! Untrusted listing query parameters.

use serde::{Deserialize, Serialize};

/// Parameter names with a fixed meaning; never treated as property filters.
pub const RESERVED_PARAMS: [&str; 4] = ["search", "page", "page_size", "display"];

/// An ordered set of query parameters.
///
/// A repeated name keeps the position of its first occurrence and the
/// value of its last one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `application/x-www-form-urlencoded` query string.
    /// Undecodable input yields no parameters.
    pub fn parse(query: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => pairs.into_iter().collect(),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable query string");
                Self::default()
            }
        }
    }

    /// Set `name`, replacing any previous value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.pairs.retain(|(k, _)| k != name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The value of `name` unless it is absent or the "no filter" sentinel.
    pub fn filter_value(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !is_null_sentinel(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters that may name a property: everything not reserved.
    pub fn property_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !RESERVED_PARAMS.contains(k))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Encode back into a query string (no leading `?`).
    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<QueryParams> for Vec<(String, String)> {
    fn from(params: QueryParams) -> Self {
        params.pairs
    }
}

/// `true` for the values that mean "no filter": empty, or `null` in any case.
pub fn is_null_sentinel(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null")
}
