//! Test doubles: a scripted in-memory search backend and a failing sink.

use crate::search::client::{SearchBackend, SearchError, SearchTarget};
use crate::search::models::Hit;
use crate::search::query::SearchQuery;

use serde_json::json;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Replays scripted search responses in order and records every query it
/// receives. Once the script runs out every search returns no hits.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedBackend {
    pub reachable: bool,
    pub indices: Vec<String>,
    responses: Arc<Mutex<VecDeque<Result<Vec<Hit>, SearchError>>>>,
    queries: Arc<Mutex<Vec<SearchQuery>>>,
}

impl ScriptedBackend {
    pub fn new(index: &str) -> Self {
        Self {
            reachable: true,
            indices: vec![index.to_string()],
            ..Default::default()
        }
    }

    pub fn respond(self, hits: Vec<Hit>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(hits));
        self
    }

    pub fn fail(self, error: SearchError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchBackend for ScriptedBackend {
    async fn ping(&self) -> Result<(), SearchError> {
        if self.reachable {
            Ok(())
        } else {
            Err(SearchError::BackendUnavailable {
                endpoint: "scripted".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        Ok(self.indices.iter().any(|known| known == index))
    }

    async fn search(
        &self,
        _target: &SearchTarget,
        query: &SearchQuery,
    ) -> Result<Vec<Hit>, SearchError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }
}

/// Hit whose document carries `msg` and its own sort key.
pub(crate) fn hit(sort_key: i64, msg: &str) -> Hit {
    Hit::new(sort_key, json!({ "ts": sort_key, "msg": msg }))
}

/// Transient failure as the HTTP client would report it.
pub(crate) fn transient_error() -> SearchError {
    SearchError::Status {
        status: 503,
        body: "search_phase_execution_exception".to_string(),
    }
}

/// Sink whose every write fails the way a closed pipe does.
#[derive(Debug)]
pub(crate) struct BrokenPipe;

impl AsyncWrite for BrokenPipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Sink that never accepts a byte, like a pipe nobody reads from.
#[derive(Debug)]
pub(crate) struct StalledSink;

impl AsyncWrite for StalledSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}
