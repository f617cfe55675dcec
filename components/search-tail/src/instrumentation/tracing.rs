use anyhow::{Context, Result};
use std::panic;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    fmt,
    prelude::*,
    registry::Registry,
};

/// Filter applied when `RUST_LOG` is unset and `--debug` is off. Transient
/// failures are logged at `warn` and stay silent unless diagnostics are on.
const QUIET_FILTER: &str = "error";
const DEBUG_DIRECTIVE: &str = "search_tail=debug";

/// Install the global subscriber. Diagnostics go to stderr so stdout carries
/// nothing but rendered documents.
///
/// The returned guard owns the non-blocking writer; dropping it flushes any
/// buffered diagnostics, so hold it until the process exits.
pub fn init_tracing(debug: bool) -> Result<WorkerGuard> {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(QUIET_FILTER));

    if debug {
        if let Ok(directive) = DEBUG_DIRECTIVE.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let error_layer = ErrorLayer::default();

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(error_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    Ok(guard)
}

pub fn init_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&str>() {
            Some(s) => (*s).to_string(),
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "Unknown panic".to_string(),
            },
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            message = %msg,
            location = %location,
            "Application panicked!"
        );

        default_hook(panic_info);
    }));
}
