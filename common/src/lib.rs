//! Shared building blocks for the provisioner and query services.
//!
//! - `config`: server params file and service settings
//! - `db`: opening and closing direct connections
//! - `errors`: the `AppError` taxonomy
//! - `models`: resource references, outcomes, query results
//! - `response`: the JSON envelope returned by every endpoint
//! - `utils`: identifier and SQL validation

pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
