//! Top-level wiring of the tail pipeline.
pub mod runtime;
