//! Batch handoff and document rendering.
pub mod dispatcher;
pub mod renderer;
