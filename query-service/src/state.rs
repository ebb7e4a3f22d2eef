//! Application state for query service.

use std::sync::Arc;

use common::config::AppConfig;
use query_service::QueryService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub service: Arc<QueryService>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: AppConfig) -> Self {
        Self {
            service: Arc::new(QueryService::new(config.clone())),
            config,
        }
    }
}
