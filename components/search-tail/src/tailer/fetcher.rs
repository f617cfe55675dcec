// Local crates
use crate::metrics::metrics::{FETCH_DURATION_SECONDS, HITS_FETCHED_TOTAL, observe_duration};
use crate::search::client::{SearchBackend, SearchError, SearchTarget};
use crate::search::models::Batch;
use crate::search::query::SearchQuery;

// External crates
use std::time::Instant;
use tracing::instrument;

/// Issues one query per call against the configured index, returning the hits
/// as a `Batch` in the order the query asked for.
#[derive(Debug)]
pub struct Fetcher<B> {
    backend: B,
    target: SearchTarget,
}

impl<B: SearchBackend> Fetcher<B> {
    pub fn new(backend: B, target: SearchTarget) -> Self {
        Self { backend, target }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Startup check: the backend answers and the index exists.
    ///
    /// Fails with `BackendUnavailable` or `IndexNotFound`, both fatal.
    #[instrument(name = "estail_fetcher::verify", level = "debug", skip_all, fields(index = %self.target.index))]
    pub async fn verify(&self) -> Result<(), SearchError> {
        self.backend.ping().await?;

        match self.backend.index_exists(&self.target.index).await {
            Ok(true) => {
                tracing::debug!("Search backend reachable and index present");
                Ok(())
            }
            Ok(false) => Err(SearchError::IndexNotFound(self.target.index.clone())),
            Err(e) => Err(e),
        }
    }

    /// Exactly one round trip. No matches is an empty batch.
    #[instrument(name = "estail_fetcher::fetch", level = "debug", skip_all)]
    pub async fn fetch(&self, query: &SearchQuery) -> Result<Batch, SearchError> {
        let start = Instant::now();
        let result = self.backend.search(&self.target, query).await;
        observe_duration(&FETCH_DURATION_SECONDS, start);

        let hits = result?;
        HITS_FETCHED_TOTAL.inc_by(hits.len() as u64);

        tracing::debug!(
            hits = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched batch from search backend"
        );
        Ok(Batch::new(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, hit};

    fn target() -> SearchTarget {
        SearchTarget::new("logs", Some("apache".to_string()))
    }

    #[tokio::test]
    async fn verify_passes_for_reachable_backend_with_index() {
        let fetcher = Fetcher::new(ScriptedBackend::new("logs"), target());
        fetcher.verify().await.unwrap();
    }

    #[tokio::test]
    async fn verify_reports_unreachable_backend() {
        let mut backend = ScriptedBackend::new("logs");
        backend.reachable = false;
        let err = Fetcher::new(backend, target()).verify().await.unwrap_err();
        assert!(matches!(err, SearchError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn verify_reports_missing_index() {
        let fetcher = Fetcher::new(ScriptedBackend::new("other"), target());
        let err = fetcher.verify().await.unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(index) if index == "logs"));
    }

    #[tokio::test]
    async fn fetch_is_one_round_trip_preserving_order() {
        let backend = ScriptedBackend::new("logs").respond(vec![hit(1, "a"), hit(2, "b")]);
        let fetcher = Fetcher::new(backend, target());

        let batch = fetcher
            .fetch(&SearchQuery::after("2020-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        assert_eq!(batch.iter().map(|h| h.sort_key).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(fetcher.backend().queries().len(), 1);
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_batch() {
        let fetcher = Fetcher::new(ScriptedBackend::new("logs"), target());
        let batch = fetcher.fetch(&SearchQuery::latest(10)).await.unwrap();
        assert!(batch.is_empty());
    }
}
