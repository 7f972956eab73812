//! Listing pagination shared by every backend.

use serde::Serialize;

use crate::config::PaginationConfig;

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
}

impl PageRequest {
    /// Create a page request from already-validated values.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Normalize raw query values.
    ///
    /// A missing, unparseable or non-positive `page` becomes 1 and has no
    /// upper bound. A missing, unparseable or non-positive `page_size`
    /// becomes the configured default; anything above the configured
    /// maximum is clamped to it.
    pub fn from_query(
        page: Option<&str>,
        page_size: Option<&str>,
        config: &PaginationConfig,
    ) -> Self {
        let page = parse_positive(page).unwrap_or(1);
        let page_size = parse_positive(page_size)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);

        Self { page, page_size }
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)).saturating_mul(u64::from(self.page_size))
    }

    /// Number of records to fetch so the presence of a next page can be
    /// detected without a second query.
    pub fn fetch_limit(&self) -> u64 {
        u64::from(self.page_size) + 1
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page, in the backend's stable order.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Whether at least one record exists beyond this page.
    #[serde(rename = "isNextPage")]
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Build a page from exact items and a known next-page flag.
    pub fn new(items: Vec<T>, request: PageRequest, has_next_page: bool) -> Self {
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            has_next_page,
        }
    }

    /// Build a page from up to `page_size + 1` records.
    ///
    /// The extra record, when present, only signals that a next page exists
    /// and is dropped.
    pub fn from_overfetch(mut records: Vec<T>, request: PageRequest) -> Self {
        let size = request.page_size as usize;
        let has_next_page = records.len() > size;
        records.truncate(size);
        Self::new(records, request, has_next_page)
    }
}
