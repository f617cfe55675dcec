// External crates
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Process-wide shutdown handle, built on-top of a `CancellationToken`.
///
/// - Cloned into every component that has to stop on interrupt.
/// - `listen_for_signals()` turns Ctrl+C / SIGTERM into a `trigger()`.
/// - `cancelled()` resolves once shutdown was triggered, so it slots into
///   `tokio::select!` next to the work it interrupts.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger shutdown, waking every `cancelled()` waiter.
    #[instrument(name = "estail_shutdown::trigger", level = "trace", skip_all)]
    pub fn trigger(&self) {
        tracing::trace!("Shutdown triggered");
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for a shutdown signal.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Child token for background tasks that must stop with the process.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Spawn a background task that triggers shutdown on Ctrl+C, and on
    /// SIGTERM where available.
    pub fn listen_for_signals(&self) {
        let shutdown = self.clone();

        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::debug!("Interrupt signal received, shutting down");
            shutdown.trigger();
        });
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use signal::unix::{SignalKind, signal as unix_signal};

    let mut terminate = match unix_signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, only Ctrl+C is handled");
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
            return;
        }
    };

    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}
