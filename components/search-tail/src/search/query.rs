//! Query Builder
//!
//! Turns "documents after watermark T, oldest first" or "latest N documents,
//! newest first" into the backend's JSON query DSL. Pure data, no I/O.

// External crates
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

/// Field every document is ordered and filtered by.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Field carrying the user agent of requests that end up logged in the index.
pub const AGENT_FIELD: &str = "agent.keyword";

/// User agent prefix this tool identifies itself with. Documents logging our
/// own search requests are excluded so tailing an access log of the search
/// cluster does not feed on itself.
pub const SELF_AGENT_PREFIX: &str = "estail/";

/// Largest result window the backend serves for a single search.
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Full user agent sent with every request.
pub fn user_agent() -> String {
    format!("{SELF_AGENT_PREFIX}{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

/// Query descriptor for one search round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Exclusive lower bound on the event timestamp, ISO-8601.
    pub after: Option<String>,
    pub order: SortOrder,
    pub size: usize,
}

impl SearchQuery {
    /// Most recent `size` documents, newest first.
    #[must_use]
    pub fn latest(size: usize) -> Self {
        Self::new(None, SortOrder::Desc, size)
    }

    /// Every document strictly after `after`, oldest first, up to the full
    /// result window.
    #[must_use]
    pub fn after(after: impl Into<String>) -> Self {
        Self::new(Some(after.into()), SortOrder::Asc, MAX_RESULT_WINDOW)
    }

    /// Build a query; `size` is clamped to the backend's result window.
    #[must_use]
    pub fn new(after: Option<String>, order: SortOrder, size: usize) -> Self {
        Self {
            after,
            order,
            size: size.min(MAX_RESULT_WINDOW),
        }
    }

    /// Request body for `POST /{index}/_search`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut bool_query = json!({
            "must_not": {
                "prefix": { AGENT_FIELD: SELF_AGENT_PREFIX }
            }
        });

        if let Some(after) = &self.after {
            bool_query["filter"] = json!({
                "range": { TIMESTAMP_FIELD: { "gt": after } }
            });
        }

        json!({
            "query": { "bool": bool_query },
            "sort": [ { TIMESTAMP_FIELD: { "order": self.order } } ],
            "size": self.size,
        })
    }
}
