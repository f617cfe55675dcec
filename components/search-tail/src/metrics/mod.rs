//! Prometheus metrics and the optional `/metrics` HTTP endpoint.
pub mod http;
pub mod metrics;
