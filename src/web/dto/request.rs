//! Request DTOs for Web API.

use serde::Deserialize;

use crate::config::PaginationConfig;
use crate::storage::PageRequest;

/// Listing query parameters.
///
/// Values are kept as raw strings so that unparseable input falls back to
/// the defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<String>,
    /// Items per page.
    #[serde(default, rename = "pageSize")]
    pub page_size: Option<String>,
}

impl PaginationQuery {
    /// Normalize into a page request.
    pub fn to_page_request(&self, config: &PaginationConfig) -> PageRequest {
        PageRequest::from_query(self.page.as_deref(), self.page_size.as_deref(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_page_request() {
        let query = PaginationQuery {
            page: Some("3".to_string()),
            page_size: Some("abc".to_string()),
        };
        let request = query.to_page_request(&PaginationConfig::default());
        assert_eq!(request, PageRequest::new(3, 10));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let query: PaginationQuery =
            serde_json::from_value(serde_json::json!({ "pageSize": "5" })).unwrap();
        assert_eq!(query.page, None);
        assert_eq!(query.page_size.as_deref(), Some("5"));
    }
}
