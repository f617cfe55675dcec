//! Poll Loop
//!
//! Orchestrates Fetcher -> Watermark -> Dispatcher on a fixed interval.
//!
//! ```text
//!   Bootstrap --(not nonstop)--> Done
//!       |
//!   (nonstop)
//!       v
//!   Streaming: fetch after watermark -> dispatch + advance -> sleep -> repeat
//! ```
//!
//! Startup failures (unreachable backend, missing index) abort the loop. A
//! failed fetch while streaming only costs one cycle: the watermark stays put
//! and the next cycle asks again for everything after it.

// Local crates
use crate::helpers::load_config::TailConfig;
use crate::metrics::metrics::FETCH_FAILURES_TOTAL;
use crate::output::dispatcher::{DispatchError, Dispatcher};
use crate::search::client::{SearchBackend, SearchError};
use crate::tailer::{fetcher::Fetcher, watermark::Watermark};

// External crates
use std::time::Duration;
use tokio::io::AsyncWrite;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Bootstrap,
    Streaming,
    Done,
}

/// What a single streaming cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A non-empty batch was dispatched and the watermark advanced.
    Dispatched(usize),
    /// Nothing new since the watermark.
    Idle,
    /// The fetch failed; nothing changed.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Poll loop knobs taken from `TailConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub initial_size: usize,
    pub nonstop: bool,
    pub interval: Duration,
}

impl From<&TailConfig> for PollSettings {
    fn from(config: &TailConfig) -> Self {
        Self {
            initial_size: config.docs,
            nonstop: config.nonstop,
            interval: config.interval,
        }
    }
}

#[derive(Debug)]
pub struct PollLoop<B, W> {
    fetcher: Fetcher<B>,
    dispatcher: Dispatcher<W>,
    settings: PollSettings,
    watermark: Option<Watermark>,
    state: TailState,
}

impl<B, W> PollLoop<B, W>
where
    B: SearchBackend,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(fetcher: Fetcher<B>, dispatcher: Dispatcher<W>, settings: PollSettings) -> Self {
        Self {
            fetcher,
            dispatcher,
            settings,
            watermark: None,
            state: TailState::Bootstrap,
        }
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    /// Drive the state machine until `Done`, handing back the dispatcher so
    /// the caller can drain the output. In nonstop mode this only returns on
    /// error; interruption is the caller dropping the future.
    #[instrument(name = "estail_poll_loop::run", level = "debug", skip_all)]
    pub async fn run(mut self) -> Result<Dispatcher<W>, TailError> {
        loop {
            let step = match self.state {
                TailState::Bootstrap => self.bootstrap().await,
                TailState::Streaming => self.stream_once().await,
                TailState::Done => {
                    tracing::debug!("Poll loop done");
                    return Ok(self.dispatcher);
                }
            };

            match step {
                Ok(()) => {}
                Err(TailError::Dispatch(DispatchError::Closed)) => {
                    return Err(self.worker_failure().await);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Verify the backend, establish the watermark and dispatch the initial
    /// documents oldest-first.
    #[instrument(name = "estail_poll_loop::bootstrap", level = "debug", skip_all)]
    pub async fn bootstrap(&mut self) -> Result<(), TailError> {
        self.fetcher.verify().await?;

        let (batch, watermark) =
            Watermark::bootstrap(&self.fetcher, self.settings.initial_size).await?;

        if !batch.is_empty() {
            self.dispatcher.dispatch(batch)?;
        }
        self.watermark = Some(watermark);

        self.state = if self.settings.nonstop {
            TailState::Streaming
        } else {
            TailState::Done
        };
        tracing::debug!(
            next_state = ?self.state,
            watermark = %watermark.as_iso8601(),
            "Bootstrap complete"
        );
        Ok(())
    }

    /// One streaming cycle: fetch everything after the watermark, dispatch it,
    /// advance. A failed fetch is logged and leaves the watermark untouched.
    #[instrument(name = "estail_poll_loop::cycle", level = "debug", skip_all)]
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, TailError> {
        let watermark = self.watermark.get_or_insert_with(Watermark::now);
        let query = watermark.next_query();

        let batch = match self.fetcher.fetch(&query).await {
            Ok(batch) => batch,
            Err(e) => {
                FETCH_FAILURES_TOTAL.inc();
                tracing::warn!(
                    error = %e,
                    transient = e.is_transient(),
                    watermark = %watermark.as_iso8601(),
                    "Fetch failed, skipping cycle"
                );
                return Ok(CycleOutcome::Skipped);
            }
        };

        let Some(newest) = batch.last_sort_key() else {
            return Ok(CycleOutcome::Idle);
        };

        let count = batch.len();
        self.dispatcher.dispatch(batch)?;
        watermark.advance_to(newest);

        tracing::debug!(
            documents = count,
            watermark = %watermark.as_iso8601(),
            "Dispatched batch and advanced watermark"
        );
        Ok(CycleOutcome::Dispatched(count))
    }

    async fn stream_once(&mut self) -> Result<(), TailError> {
        self.run_cycle().await?;

        tokio::select! {
            _ = tokio::time::sleep(self.settings.interval) => Ok(()),
            _ = self.dispatcher.closed() => Err(DispatchError::Closed.into()),
        }
    }

    /// The render worker stopped on its own; collect why.
    async fn worker_failure(self) -> TailError {
        match self.dispatcher.finish().await {
            Err(e) => e.into(),
            Ok(_) => DispatchError::Closed.into(),
        }
    }
}
