// External crates
use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntGauge, register_histogram, register_int_counter,
    register_int_gauge,
};
use std::time::Instant;

/// Helper to observe histogram duration
pub fn observe_duration(hist: &Histogram, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    hist.observe(elapsed);
}

// Registration only fails on a duplicate metric name.
lazy_static! {
    // ======== Fetch Metrics ========

    /// Hits returned by the search backend, bootstrap included
    pub static ref HITS_FETCHED_TOTAL: IntCounter = register_int_counter!(
        "estail_hits_fetched_total",
        "Number of hits returned by the search backend"
    ).expect("estail_hits_fetched_total registers once");

    /// Fetch cycles skipped because the backend call failed
    pub static ref FETCH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "estail_fetch_failures_total",
        "Number of polling cycles skipped after a failed fetch"
    ).expect("estail_fetch_failures_total registers once");

    /// Round trip time of a single search request
    pub static ref FETCH_DURATION_SECONDS: Histogram = register_histogram!(
        "estail_fetch_duration_seconds",
        "Histogram of search request durations in seconds",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).expect("estail_fetch_duration_seconds registers once");

    // ======== Cursor Metrics ========

    /// Current watermark, epoch milliseconds
    pub static ref WATERMARK_EPOCH_MS: IntGauge = register_int_gauge!(
        "estail_watermark_epoch_ms",
        "Event timestamp (epoch ms) up to which documents have been emitted"
    ).expect("estail_watermark_epoch_ms registers once");

    // ======== Output Metrics ========

    /// Batches handed to the render worker and not yet rendered
    pub static ref PENDING_BATCHES: IntGauge = register_int_gauge!(
        "estail_pending_batches",
        "Batches queued for rendering"
    ).expect("estail_pending_batches registers once");

    pub static ref DOCUMENTS_RENDERED_TOTAL: IntCounter = register_int_counter!(
        "estail_documents_rendered_total",
        "Number of documents written to the output"
    ).expect("estail_documents_rendered_total registers once");
}
