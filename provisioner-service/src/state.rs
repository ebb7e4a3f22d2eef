//! Application state for provisioner service.

use std::sync::Arc;

use common::config::{AppConfig, DatabaseRole};
use common::errors::AppResult;
use provisioner_service::{PgConnector, Provisioner};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub provisioner: Arc<Provisioner<PgConnector>>,
}

impl AppState {
    /// Creates a new application state. No connection is opened here.
    pub fn new(config: AppConfig, role: DatabaseRole) -> AppResult<Self> {
        let connector = PgConnector::new(&config, role)?;
        Ok(Self {
            provisioner: Arc::new(Provisioner::new(connector)),
            config,
        })
    }

    pub fn connector(&self) -> &PgConnector {
        self.provisioner.connector()
    }
}
