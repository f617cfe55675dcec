// Local crates
use crate::helpers::converters::iso8601_to_millis;
use crate::search::query::TIMESTAMP_FIELD;

// External crates
use serde::Deserialize;
use serde_json::Value;

/// One matched document plus the epoch-millisecond sort key it was ordered by.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub sort_key: i64,
    pub source: Value,
}

impl Hit {
    pub fn new(sort_key: i64, source: Value) -> Self {
        Self { sort_key, source }
    }
}

/// Hits returned by one fetch, in the order the query requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    hits: Vec<Hit>,
}

impl Batch {
    pub fn new(hits: Vec<Hit>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hit> {
        self.hits.iter()
    }

    /// Sort key of the final hit, the most recent one in an ascending batch.
    pub fn last_sort_key(&self) -> Option<i64> {
        self.hits.last().map(|hit| hit.sort_key)
    }

    /// Flip a newest-first batch into the oldest-first order consumers expect.
    #[must_use]
    pub fn into_reversed(mut self) -> Self {
        self.hits.reverse();
        self
    }
}

impl IntoIterator for Batch {
    type Item = Hit;
    type IntoIter = std::vec::IntoIter<Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

//
// ------------------------ Wire format ------------------------------
//

/// `_search` response body, only the parts the tailer reads.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Value,
    #[serde(default)]
    pub sort: Vec<Value>,
}

impl RawHit {
    /// Sort key from `sort[0]`, falling back to the document's own
    /// `@timestamp` when the backend omitted sort values.
    pub fn sort_key(&self) -> Option<i64> {
        self.sort
            .first()
            .and_then(sort_value_to_millis)
            .or_else(|| {
                self.source
                    .get(TIMESTAMP_FIELD)
                    .and_then(Value::as_str)
                    .and_then(iso8601_to_millis)
            })
    }
}

fn sort_value_to_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse::<i64>().ok().or_else(|| iso8601_to_millis(s)),
        _ => None,
    }
}
