//! The polling core: fetching, watermark tracking and the poll loop.
pub mod fetcher;
pub mod poll_loop;
pub mod watermark;
