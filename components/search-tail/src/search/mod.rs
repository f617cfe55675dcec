//! Search backend access: query construction, wire models and the HTTP client.
pub mod client;
pub mod models;
pub mod query;
