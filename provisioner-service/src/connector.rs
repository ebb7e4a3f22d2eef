//! Connection acquisition.
//!
//! Every top-level operation opens its own connection and closes it when the
//! operation ends. Nothing is pooled or cached between calls.

use std::time::Duration;

use async_trait::async_trait;
use common::config::{AppConfig, DatabaseRole};
use common::db::open_connection;
use common::errors::AppResult;
use sqlx::postgres::{PgConnectOptions, PgConnection};

use crate::catalog::{CatalogSession, PgSession};

/// Opens catalog sessions against one target server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: CatalogSession;

    /// Opens a fresh session owned by the caller.
    async fn connect(&self) -> AppResult<Self::Session>;
}

/// Connector for a Postgres server described by the server params file.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
    timeout: Duration,
    role: DatabaseRole,
}

impl PgConnector {
    /// Builds a connector for the database `role` points at. Does not connect.
    pub fn new(config: &AppConfig, role: DatabaseRole) -> AppResult<Self> {
        Ok(Self {
            options: config.params.connect_options(role)?,
            timeout: config.connect_timeout(),
            role,
        })
    }

    pub fn role(&self) -> DatabaseRole {
        self.role
    }

    /// Name of the database sessions are opened against.
    pub fn database(&self) -> &str {
        self.options.get_database().unwrap_or_default()
    }

    /// Opens a raw connection, bounded by the configured connect timeout.
    pub async fn open(&self) -> AppResult<PgConnection> {
        open_connection(&self.options, self.timeout).await
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self) -> AppResult<PgSession> {
        Ok(PgSession::new(self.open().await?))
    }
}
