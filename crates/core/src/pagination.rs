//! Page/limit pagination and search parameters for list reads.

use serde::Serialize;

use crate::{DomainError, DomainResult};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
/// Upper bound applied to caller-supplied limits.
pub const MAX_LIMIT: u32 = 100;

/// A validated (1-based) page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build a request; `page` and `limit` must be at least 1, `limit` is capped.
    pub fn new(page: u32, limit: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::invalid_parameter("page must be >= 1"));
        }
        if limit == 0 {
            return Err(DomainError::invalid_parameter("limit must be >= 1"));
        }
        Ok(Self {
            page,
            limit: limit.min(MAX_LIMIT),
        })
    }

    /// Parse raw query-string values, applying defaults for absent ones.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> DomainResult<Self> {
        let page = parse_param("page", page, DEFAULT_PAGE)?;
        let limit = parse_param("limit", limit, DEFAULT_LIMIT)?;
        Self::new(page, limit)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        (u64::from(self.page) - 1) * u64::from(self.limit)
    }

    /// Index of the last page for `total` records: `ceil(total / limit)`.
    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

fn parse_param(name: &str, raw: Option<&str>, default: u32) -> DomainResult<u32> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| DomainError::invalid_parameter(format!("{name} must be a positive integer"))),
    }
}

/// Search + pagination for a list read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListQuery {
    search: Option<String>,
    page: PageRequest,
}

impl ListQuery {
    /// Blank search terms are treated as "no filter".
    pub fn new(search: Option<String>, page: PageRequest) -> Self {
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { search, page }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    /// Case-insensitive literal substring match against `haystack`.
    pub fn matches(&self, haystack: &str) -> bool {
        match &self.search {
            None => true,
            Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

/// One page of results plus the counters the envelope reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            limit: request.limit(),
            last_page: request.last_page(total),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_apply_when_params_absent() {
        let req = PageRequest::parse(None, None).unwrap();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), 10);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn rejects_zero_and_non_numeric_values() {
        assert!(PageRequest::parse(Some("0"), None).is_err());
        assert!(PageRequest::parse(None, Some("0")).is_err());
        assert!(PageRequest::parse(Some("two"), None).is_err());
        assert!(PageRequest::parse(None, Some("-5")).is_err());
    }

    #[test]
    fn caps_limit() {
        let req = PageRequest::parse(None, Some("5000")).unwrap();
        assert_eq!(req.limit(), MAX_LIMIT);
    }

    #[test]
    fn last_page_rounds_up() {
        let req = PageRequest::new(1, 10).unwrap();
        assert_eq!(req.last_page(0), 0);
        assert_eq!(req.last_page(1), 1);
        assert_eq!(req.last_page(10), 1);
        assert_eq!(req.last_page(11), 2);
        assert_eq!(req.last_page(25), 3);
    }

    #[test]
    fn blank_search_means_no_filter() {
        let q = ListQuery::new(Some("   ".to_string()), PageRequest::default());
        assert_eq!(q.search(), None);
        assert!(q.matches("anything"));
    }

    #[test]
    fn search_is_case_insensitive_and_literal() {
        let q = ListQuery::new(Some("CoF".to_string()), PageRequest::default());
        assert!(q.matches("Corner Coffee"));
        assert!(!q.matches("Tea House"));

        let dot = ListQuery::new(Some(".*".to_string()), PageRequest::default());
        assert!(!dot.matches("regex would match this"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: walking every page from 1..=last_page covers exactly `total` records.
        #[test]
        fn pages_cover_total_exactly(total in 0u64..5_000, limit in 1u32..=100) {
            let last = PageRequest::new(1, limit).unwrap().last_page(total);
            let mut covered = 0u64;
            for page in 1..=last {
                let req = PageRequest::new(page as u32, limit).unwrap();
                let remaining = total.saturating_sub(req.offset());
                covered += remaining.min(u64::from(limit));
            }
            prop_assert_eq!(covered, total);
        }

        /// Property: the page after the last one is always empty.
        #[test]
        fn page_after_last_is_empty(total in 0u64..5_000, limit in 1u32..=100) {
            let last = PageRequest::new(1, limit).unwrap().last_page(total);
            let beyond = PageRequest::new(last as u32 + 1, limit).unwrap();
            prop_assert!(beyond.offset() >= total);
        }
    }
}
