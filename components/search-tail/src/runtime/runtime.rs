// Local crates
use crate::{
    helpers::{load_config::TailConfig, shutdown::Shutdown},
    metrics::http::{bind_metrics_listener, serve_metrics},
    output::{dispatcher::Dispatcher, renderer::Renderer},
    search::client::{ElasticClient, SearchBackend, SearchTarget},
    tailer::{
        fetcher::Fetcher,
        poll_loop::{PollLoop, PollSettings},
    },
};

// External crates
use anyhow::{Context, Result};
use tokio::io::AsyncWrite;
use tracing::instrument;

/// estail runtime initialization and setup.
///
/// Wires signal handling, the optional metrics endpoint and the search client,
/// then tails into stdout until done or interrupted.
#[instrument(name = "estail_runtime::run", level = "debug", skip_all)]
pub async fn run_tail(config: TailConfig) -> Result<()> {
    // Initialize process-wide shutdown handle
    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    // Start metrics server
    if let Some(addr) = config.metrics_addr {
        let listener = bind_metrics_listener(addr).await?;
        tokio::spawn(serve_metrics(listener, shutdown.child_token()));
    }

    let backend = ElasticClient::new(
        &config.endpoint,
        config.verify_certs,
        config.ca_certs.as_deref(),
    )
    .with_context(|| format!("Failed to set up search client for {}", config.endpoint))?;

    run_tail_with(backend, &config, tokio::io::stdout(), &shutdown).await?;

    // Stop the metrics server along with everything else
    shutdown.trigger();
    Ok(())
}

/// Run the tail pipeline against any backend and sink.
///
/// Returns the sink once the loop finished and every dispatched document was
/// written, or `None` when shutdown interrupted it. Interruption does not wait
/// for queued output, not even after the loop itself has finished.
#[instrument(
    name = "estail_runtime::tail",
    level = "debug",
    skip_all,
    fields(index = %config.index, nonstop = config.nonstop)
)]
pub async fn run_tail_with<B, W>(
    backend: B,
    config: &TailConfig,
    sink: W,
    shutdown: &Shutdown,
) -> Result<Option<W>>
where
    B: SearchBackend,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let dispatcher = Dispatcher::spawn(Renderer::new(config.format), sink);
    let fetcher = Fetcher::new(
        backend,
        SearchTarget::new(config.index.clone(), config.doc_type.clone()),
    );
    let poll_loop = PollLoop::new(fetcher, dispatcher, PollSettings::from(config));

    tracing::debug!(
        endpoint = %config.endpoint,
        doc_type = ?config.doc_type,
        docs = config.docs,
        "Starting tail"
    );

    let finished = tokio::select! {
        finished = poll_loop.run() => finished,
        _ = shutdown.cancelled() => {
            tracing::debug!("Shutdown signal received, stopping tail");
            return Ok(None);
        }
    };

    // The error is reported once, by the caller.
    let dispatcher = finished.with_context(|| {
        format!("Failed to tail index {:?} on {}", config.index, config.endpoint)
    })?;

    // Draining can block on a slow or stalled sink, so it stays interruptible.
    tokio::select! {
        drained = dispatcher.finish() => {
            let sink = drained.context("Failed to write queued documents to output")?;
            tracing::debug!("Tail finished, output drained");
            Ok(Some(sink))
        }
        _ = shutdown.cancelled() => {
            tracing::debug!("Shutdown signal received while draining output");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::load_config::{FileConfig, TailOverrides};
    use crate::output::renderer::OutputFormat;
    use crate::search::client::SearchError;
    use crate::tailer::poll_loop::TailError;
    use crate::testing::{ScriptedBackend, StalledSink, hit};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::instrument::WithSubscriber;

    fn config(nonstop: bool, docs: usize) -> TailConfig {
        TailConfig::resolve(
            TailOverrides {
                endpoint: Some("http://localhost:9200".to_string()),
                index: Some("logs".to_string()),
                nonstop,
                docs: Some(docs),
                format: Some(OutputFormat::Kv),
                ..Default::default()
            },
            FileConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn single_shot_drains_output_before_returning() {
        let backend = ScriptedBackend::new("logs").respond(vec![hit(2, "b"), hit(1, "a")]);

        let sink = run_tail_with(backend, &config(false, 2), Vec::new(), &Shutdown::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(String::from_utf8(sink).unwrap(), "ts=1 msg=a\nts=2 msg=b\n");
    }

    #[tokio::test]
    async fn fatal_errors_keep_their_cause() {
        let err = run_tail_with(
            ScriptedBackend::new("other"),
            &config(false, 10),
            Vec::new(),
            &Shutdown::new(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("logs"));
        assert!(matches!(
            err.downcast_ref::<TailError>(),
            Some(TailError::Search(SearchError::IndexNotFound(_)))
        ));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn fatal_errors_are_left_to_the_caller_to_report() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let err = run_tail_with(
            ScriptedBackend::new("other"),
            &config(false, 10),
            Vec::new(),
            &Shutdown::new(),
        )
        .with_subscriber(subscriber)
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("does not exist"));
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.is_empty(), "unexpected error events: {logged}");
    }

    #[tokio::test]
    async fn interrupt_while_draining_output_returns_promptly() {
        let backend = ScriptedBackend::new("logs").respond(vec![hit(1, "stuck")]);
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.trigger();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            run_tail_with(backend, &config(false, 1), StalledSink, &shutdown),
        )
        .await
        .expect("interrupt during drain must end the tail")
        .unwrap();

        assert!(outcome.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_ends_nonstop_tail_cleanly() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.trigger();
        });

        let outcome = run_tail_with(
            ScriptedBackend::new("logs"),
            &config(true, 10),
            Vec::new(),
            &shutdown,
        )
        .await
        .unwrap();

        assert!(outcome.is_none());
    }
}
