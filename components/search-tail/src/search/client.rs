//! Search client - responsibility and behavior
//!
//! The client owns the HTTP connection pool to the search backend and speaks
//! just enough of its REST API for tailing:
//! - `HEAD /`                           reachability ping
//! - `HEAD /{index}`                    index existence
//! - `POST /{index}[/{type}]/_search`   one query, one page of hits
//!
//! The tailing core only sees the `SearchBackend` trait, so tests swap in a
//! scripted in-memory backend.

// Local crates
use crate::helpers::endpoint::NormalizedEndpoint;
use crate::search::models::{Hit, SearchResponse};
use crate::search::query::{SearchQuery, user_agent};

// External crates
use reqwest::{Certificate, Client, StatusCode, Url};
use std::future::Future;
use std::path::Path;
use tracing::instrument;

/// Longest backend error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Search client error handling
/// - `BackendUnavailable` and `IndexNotFound` are startup verdicts.
/// - Everything else is a failed round trip the poll loop may retry.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("connection failure: search backend at {endpoint} is unreachable: {reason}")]
    BackendUnavailable { endpoint: String, reason: String },
    #[error("index {0:?} does not exist")]
    IndexNotFound(String),
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("search backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed search response: {0}")]
    Decode(String),
    #[error("failed to build search client: {0}")]
    Client(String),
}

impl SearchError {
    /// Whether the error only concerns one round trip.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::Request(_) | SearchError::Status { .. } | SearchError::Decode(_)
        )
    }
}

/// Where queries are sent: index plus optional mapping type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    pub index: String,
    pub doc_type: Option<String>,
}

impl SearchTarget {
    pub fn new(index: impl Into<String>, doc_type: Option<String>) -> Self {
        Self {
            index: index.into(),
            doc_type,
        }
    }
}

/// The narrow interface the tailer needs from a search backend.
pub trait SearchBackend {
    /// Health check, fails with `BackendUnavailable`.
    fn ping(&self) -> impl Future<Output = Result<(), SearchError>> + Send;

    fn index_exists(&self, index: &str) -> impl Future<Output = Result<bool, SearchError>> + Send;

    /// One query, one round trip. Hits come back in the order the query asked
    /// for; no matches is an empty vector.
    fn search(
        &self,
        target: &SearchTarget,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<Vec<Hit>, SearchError>> + Send;
}

/// `reqwest` backed client for Elasticsearch compatible endpoints.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    client: Client,
    base: Url,
}

impl ElasticClient {
    /// Build a client for `endpoint`.
    ///
    /// For https endpoints `verify_certs` toggles certificate verification and
    /// `ca_certs` adds a PEM bundle to the trusted roots.
    #[instrument(name = "estail_search_client::create", level = "debug", skip_all)]
    pub fn new(
        endpoint: &NormalizedEndpoint,
        verify_certs: bool,
        ca_certs: Option<&Path>,
    ) -> Result<Self, SearchError> {
        let mut builder = Client::builder().user_agent(user_agent());

        if endpoint.secure {
            tracing::debug!(verify_certs, "Configuring TLS for search endpoint");
            builder = builder.danger_accept_invalid_certs(!verify_certs);

            if let Some(path) = ca_certs {
                let pem = std::fs::read(path).map_err(|e| {
                    SearchError::Client(format!("failed to read CA bundle {}: {e}", path.display()))
                })?;
                let certs = Certificate::from_pem_bundle(&pem).map_err(|e| {
                    SearchError::Client(format!("invalid CA bundle {}: {e}", path.display()))
                })?;

                tracing::debug!(
                    ca_bundle = %path.display(),
                    certificates = certs.len(),
                    "Adding CA bundle to trusted roots"
                );
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        let client = builder
            .build()
            .map_err(|e| SearchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base: endpoint.url.clone(),
        })
    }

    /// Endpoint URL with `segments` appended to its path, percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                SearchError::Client(format!("endpoint {} cannot carry a path", self.base))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }
}

impl SearchBackend for ElasticClient {
    #[instrument(name = "estail_search_client::ping", level = "debug", skip_all)]
    async fn ping(&self) -> Result<(), SearchError> {
        let url = self.url(&[])?;
        let unavailable = |reason: String| SearchError::BackendUnavailable {
            endpoint: self.base.to_string(),
            reason,
        };

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if response.status().is_success() {
            tracing::debug!(status = %response.status(), "Search backend answered ping");
            Ok(())
        } else {
            Err(unavailable(format!("ping returned {}", response.status())))
        }
    }

    #[instrument(name = "estail_search_client::index_exists", level = "debug", skip_all, fields(index = %index))]
    async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        let response = self.client.head(self.url(&[index])?).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SearchError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    #[instrument(name = "estail_search_client::search", level = "debug", skip_all, fields(index = %target.index))]
    async fn search(
        &self,
        target: &SearchTarget,
        query: &SearchQuery,
    ) -> Result<Vec<Hit>, SearchError> {
        let url = match &target.doc_type {
            Some(doc_type) => self.url(&[target.index.as_str(), doc_type.as_str(), "_search"])?,
            None => self.url(&[target.index.as_str(), "_search"])?,
        };

        tracing::debug!(
            after = query.after.as_deref().unwrap_or("-"),
            order = %query.order,
            size = query.size,
            "Sending search request"
        );

        let response = self
            .client
            .post(url)
            .json(&query.to_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let decoded: SearchResponse =
            serde_json::from_slice(&bytes).map_err(|e| SearchError::Decode(e.to_string()))?;

        decoded
            .hits
            .hits
            .into_iter()
            .map(|raw| match raw.sort_key() {
                Some(sort_key) => Ok(Hit::new(sort_key, raw.source)),
                None => Err(SearchError::Decode(format!(
                    "hit {} carries no sort key",
                    raw.id.as_deref().unwrap_or("<unknown>")
                ))),
            })
            .collect()
    }
}
