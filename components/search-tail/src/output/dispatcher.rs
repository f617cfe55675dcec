//! Dispatcher - responsibility and behavior
//!
//! The Dispatcher decouples the fetch cadence from the output cadence. The
//! poll loop pushes whole batches onto an unbounded FIFO channel; a single
//! render worker task drains it, writing every document of a batch in order
//! before taking the next batch.
//!
//! ```text
//! PollLoop --dispatch(batch)--> [ mpsc::unbounded ] --> render worker --> sink
//! ```
//!
//! - Batches are never reordered or dropped.
//! - The worker only stops when every sender is gone (after draining) or when
//!   a write fails. A failed write is fatal: the worker exits with the error
//!   and the next `dispatch` reports the channel as closed.

// Local crates
use crate::metrics::metrics::{DOCUMENTS_RENDERED_TOTAL, PENDING_BATCHES};
use crate::output::renderer::{RenderError, Renderer};
use crate::search::models::Batch;

// External crates
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("render worker is no longer accepting batches")]
    Closed,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("render worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Producer side of the batch handoff, owning the render worker task.
#[derive(Debug)]
pub struct Dispatcher<W> {
    sender: mpsc::UnboundedSender<Batch>,
    worker: JoinHandle<Result<W, RenderError>>,
}

impl<W> Dispatcher<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Spawn the render worker writing to `sink` and return the producer side.
    #[instrument(name = "estail_dispatcher::spawn", level = "debug", skip_all)]
    pub fn spawn(renderer: Renderer, sink: W) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<Batch>();

        tracing::debug!(format = ?renderer.format(), "Spawning render worker");
        let worker = tokio::spawn(run_worker(renderer, receiver, sink));

        Self { sender, worker }
    }

    /// Enqueue a batch for rendering. Never blocks; fails only when the worker
    /// has stopped.
    pub fn dispatch(&self, batch: Batch) -> Result<(), DispatchError> {
        let size = batch.len();
        // Count before sending, the worker may pick the batch up immediately.
        PENDING_BATCHES.inc();
        if self.sender.send(batch).is_err() {
            PENDING_BATCHES.dec();
            return Err(DispatchError::Closed);
        }

        tracing::debug!(batch_size = size, "Batch handed to render worker");
        Ok(())
    }

    /// Resolves once the worker stopped accepting batches.
    pub async fn closed(&self) {
        self.sender.closed().await;
    }

    /// Close the queue, let the worker render everything still queued, and
    /// hand back the sink.
    #[instrument(name = "estail_dispatcher::finish", level = "debug", skip_all)]
    pub async fn finish(self) -> Result<W, DispatchError> {
        drop(self.sender);
        tracing::debug!("Waiting for render worker to drain queued batches");
        Ok(self.worker.await??)
    }
}

/// Render worker loop: one batch at a time, one document at a time, flushing
/// after each batch.
#[instrument(name = "estail_dispatcher::run_worker", level = "debug", skip_all)]
async fn run_worker<W>(
    renderer: Renderer,
    receiver: mpsc::UnboundedReceiver<Batch>,
    mut sink: W,
) -> Result<W, RenderError>
where
    W: AsyncWrite + Unpin,
{
    let mut batches = UnboundedReceiverStream::new(receiver);

    while let Some(batch) = batches.next().await {
        PENDING_BATCHES.dec();

        for hit in batch {
            if let Err(e) = renderer.write_document(&mut sink, &hit.source).await {
                tracing::error!(error = %e, "Output write failed, stopping render worker");
                return Err(e);
            }
            DOCUMENTS_RENDERED_TOTAL.inc();
        }

        if let Err(e) = sink.flush().await {
            tracing::error!(error = %e, "Output flush failed, stopping render worker");
            return Err(e.into());
        }
    }

    tracing::debug!("Render worker queue closed and drained");
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::renderer::OutputFormat;
    use crate::testing::{BrokenPipe, hit};

    #[tokio::test]
    async fn renders_batches_in_fifo_order() {
        let dispatcher = Dispatcher::spawn(Renderer::new(OutputFormat::Kv), Vec::new());

        dispatcher
            .dispatch(Batch::new(vec![hit(1, "one"), hit(2, "two")]))
            .unwrap();
        dispatcher.dispatch(Batch::empty()).unwrap();
        dispatcher.dispatch(Batch::new(vec![hit(3, "three")])).unwrap();

        let output = String::from_utf8(dispatcher.finish().await.unwrap()).unwrap();
        assert_eq!(output, "ts=1 msg=one\nts=2 msg=two\nts=3 msg=three\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pending_gauge_never_goes_negative() {
        let dispatcher = Dispatcher::spawn(Renderer::new(OutputFormat::Kv), Vec::new());

        for i in 0..2_000 {
            dispatcher.dispatch(Batch::new(vec![hit(i, "x")])).unwrap();
            assert!(PENDING_BATCHES.get() >= 0);
            if i % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }

        dispatcher.finish().await.unwrap();
        assert!(PENDING_BATCHES.get() >= 0);
    }

    #[tokio::test]
    async fn write_failure_closes_the_queue() {
        let dispatcher = Dispatcher::spawn(Renderer::new(OutputFormat::Json), BrokenPipe);
        dispatcher.dispatch(Batch::new(vec![hit(1, "one")])).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), dispatcher.closed())
            .await
            .unwrap();
        assert!(matches!(
            dispatcher.dispatch(Batch::new(vec![hit(2, "two")])),
            Err(DispatchError::Closed)
        ));

        let err = dispatcher.finish().await.unwrap_err();
        assert!(matches!(err, DispatchError::Render(RenderError::Write(_))));
    }
}
