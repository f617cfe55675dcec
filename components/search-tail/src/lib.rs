//! `estail` follows documents as they land in a search index, the way
//! `tail -f` follows a file.
//!
//! ```text
//! Fetcher -> Watermark -> Dispatcher -> Renderer -> stdout
//! ```

pub mod cli;
pub mod helpers;
pub mod instrumentation;
pub mod metrics;
pub mod output;
pub mod runtime;
pub mod search;
pub mod tailer;

#[cfg(test)]
pub(crate) mod testing;
