//! Configuration, endpoint handling, time conversions and shutdown plumbing.
pub mod converters;
pub mod endpoint;
pub mod load_config;
pub mod shutdown;
