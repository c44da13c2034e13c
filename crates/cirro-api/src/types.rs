// Wire types shared by every endpoint: the list envelope and the error
// body. Individual resource payloads stay opaque (`serde_json::Value`) --
// the state layer above treats entities as documents, not structs.

use serde::{Deserialize, Serialize};

/// One page of a collection endpoint.
///
/// Every list endpoint wraps its results in the same envelope:
/// `{ "data": [...], "page": 1, "pages": 4, "results": 94 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// 1-based page index of this response.
    pub page: u32,
    /// Total number of pages for the current filter.
    pub pages: u32,
    /// Total number of results across all pages for the current filter.
    pub results: u64,
}

impl<T> Page<T> {
    /// An empty first page, used as a neutral value by callers that
    /// synthesize envelopes from local state.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            page: 1,
            pages: 1,
            results: 0,
        }
    }
}

/// One entry of the API's error body `{ "errors": [{reason, field}] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorItem {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// The error body shape returned on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}
