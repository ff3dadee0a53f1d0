//! # Listing Orchestrator
//!
//! filter → paginate → project, over one consistent snapshot of the
//! schema and the contact collection.

use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};

use crate::filter::FilterSet;
use crate::model::ContactRecord;
use crate::projection::{DisplaySpec, Projection, Record};
use crate::query::QueryParams;
use crate::schema::Catalog;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// Pagination
// ============================================================================

/// Requested page before clamping to the result size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    /// 1-based page number.
    Number(usize),
    /// The `last` keyword.
    Last,
}

/// Page selection parsed from `page` / `page_size`. Never fails: malformed
/// input falls back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: PageNumber,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: PageNumber::Number(1),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn from_params(params: &QueryParams) -> Self {
        let page = match params.get("page").map(str::trim) {
            Some("last") => PageNumber::Last,
            Some(raw) => match parse_count(raw) {
                Some(Count::Exact(n)) if n >= 1 => PageNumber::Number(n),
                Some(Count::TooLarge) => PageNumber::Last,
                _ => PageNumber::Number(1),
            },
            None => PageNumber::Number(1),
        };

        let page_size = match params.get("page_size").map(|s| parse_count(s.trim())) {
            Some(Some(Count::Exact(n))) if n >= 1 => n.min(MAX_PAGE_SIZE),
            Some(Some(Count::TooLarge)) => MAX_PAGE_SIZE,
            _ => DEFAULT_PAGE_SIZE,
        };

        Self { page, page_size }
    }

    /// Resolve against a result count: pages beyond the end clamp to the
    /// last page, and an empty result still has page 1.
    pub fn resolve(&self, count: usize) -> PageInfo {
        let num_pages = count.div_ceil(self.page_size).max(1);
        let page = match self.page {
            PageNumber::Last => num_pages,
            PageNumber::Number(n) => n.clamp(1, num_pages),
        };
        PageInfo {
            count,
            page,
            page_size: self.page_size,
            num_pages,
        }
    }
}

enum Count {
    Exact(usize),
    /// All digits, but beyond `usize`.
    TooLarge,
}

fn parse_count(raw: &str) -> Option<Count> {
    match raw.parse::<usize>() {
        Ok(n) => Some(Count::Exact(n)),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(Count::TooLarge),
        Err(_) => None,
    }
}

/// Where a page sits within the filtered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Filtered total, before pagination.
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub num_pages: usize,
}

impl PageInfo {
    pub fn has_next(&self) -> bool {
        self.page < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Index range of this page within the filtered result.
    pub fn bounds(&self) -> std::ops::Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(self.count);
        let end = (start + self.page_size).min(self.count);
        start..end
    }
}

// ============================================================================
// Listing
// ============================================================================

/// One page of projected contacts.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<Record>,
    pub page_info: PageInfo,
}

/// Wire shape of a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Record>,
}

impl Listing {
    /// Attach navigation links built from the request's base URL and its
    /// original parameters.
    pub fn into_response(self, base_url: &str, params: &QueryParams) -> PageResponse {
        let info = self.page_info;
        let next = info
            .has_next()
            .then(|| page_link(base_url, params, Some(info.page + 1)));
        let previous = info.has_previous().then(|| {
            let target = info.page - 1;
            page_link(base_url, params, (target > 1).then_some(target))
        });

        PageResponse {
            count: info.count,
            next,
            previous,
            results: self.items,
        }
    }
}

/// `base_url` with `params`, `page` replaced by `page` or removed when `None`.
pub fn page_link(base_url: &str, params: &QueryParams, page: Option<usize>) -> String {
    let params = match page {
        Some(n) => params.clone().with("page", n.to_string()),
        None => params.clone().without("page"),
    };
    if params.is_empty() {
        base_url.to_owned()
    } else {
        format!("{base_url}?{}", params.to_query_string())
    }
}

/// Run a listing over a snapshot.
///
/// Only the requested page is projected; `count` is the filtered total.
pub fn list(catalog: &Catalog, records: &[ContactRecord], params: &QueryParams) -> Listing {
    let filters = FilterSet::from_params(catalog, params);
    let matched = filters.apply(catalog, records);

    let page_info = PageRequest::from_params(params).resolve(matched.len());
    let projection = Projection::resolve(catalog, &DisplaySpec::from_params(params));

    let items = matched[page_info.bounds()]
        .iter()
        .map(|record| projection.apply(record))
        .collect();

    tracing::debug!(
        count = page_info.count,
        page = page_info.page,
        page_size = page_info.page_size,
        "listed contacts"
    );

    Listing { items, page_info }
}
