//! Watermark Tracker
//!
//! The watermark is the event timestamp (epoch ms) up to which every document
//! has been emitted. Incremental queries ask for documents strictly after it.
//! It only ever moves forward, and only past documents that were actually
//! dispatched; an empty batch leaves it where it is so nothing between the
//! old and a guessed new position can be skipped.

// Local crates
use crate::helpers::converters::{millis_to_iso8601, now_millis};
use crate::metrics::metrics::WATERMARK_EPOCH_MS;
use crate::search::client::{SearchBackend, SearchError};
use crate::search::models::Batch;
use crate::search::query::SearchQuery;
use crate::tailer::fetcher::Fetcher;

// External crates
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    millis: i64,
}

impl Watermark {
    pub fn at(millis: i64) -> Self {
        Self { millis }
    }

    pub fn now() -> Self {
        Self::at(now_millis())
    }

    /// Fetch the latest `initial_size` documents and place the watermark on
    /// the newest of them.
    ///
    /// Returns the documents oldest-first. With nothing to fetch (empty index
    /// or `initial_size == 0`) the watermark starts at the current time.
    #[instrument(name = "estail_watermark::bootstrap", level = "debug", skip_all, fields(initial_size = initial_size))]
    pub async fn bootstrap<B: SearchBackend>(
        fetcher: &Fetcher<B>,
        initial_size: usize,
    ) -> Result<(Batch, Self), SearchError> {
        if initial_size == 0 {
            tracing::debug!("Bootstrap size is zero, starting from the current time");
            let watermark = Self::now();
            WATERMARK_EPOCH_MS.set(watermark.millis);
            return Ok((Batch::empty(), watermark));
        }

        let batch = fetcher
            .fetch(&SearchQuery::latest(initial_size))
            .await?
            .into_reversed();

        let watermark = match batch.last_sort_key() {
            Some(newest) => Self::at(newest),
            None => {
                tracing::debug!("Index holds no matching documents, starting from the current time");
                Self::now()
            }
        };

        WATERMARK_EPOCH_MS.set(watermark.millis);
        tracing::debug!(
            documents = batch.len(),
            watermark = %watermark.as_iso8601(),
            "Watermark bootstrapped"
        );
        Ok((batch, watermark))
    }

    /// Move past a dispatched ascending batch. Empty batches are a no-op, and
    /// the watermark never moves backwards.
    pub fn advance(&mut self, batch: &Batch) {
        if let Some(newest) = batch.last_sort_key() {
            self.advance_to(newest);
        }
    }

    /// Move to the sort key of the newest dispatched document.
    pub fn advance_to(&mut self, newest: i64) {
        if newest < self.millis {
            tracing::warn!(
                watermark = self.millis,
                batch_newest = newest,
                "Batch ends before the watermark, keeping the watermark"
            );
            return;
        }

        self.millis = newest;
        WATERMARK_EPOCH_MS.set(newest);
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Lower bound for the next incremental query.
    pub fn as_iso8601(&self) -> String {
        millis_to_iso8601(self.millis)
    }

    /// Query for everything after the watermark, oldest first.
    #[must_use]
    pub fn next_query(&self) -> SearchQuery {
        SearchQuery::after(self.as_iso8601())
    }
}
