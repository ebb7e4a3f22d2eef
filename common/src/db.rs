//! Direct Postgres connections.
//!
//! Operations open one connection each and close it when they finish;
//! nothing is pooled.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use crate::errors::{AppError, AppResult};

/// Opens a connection, bounded by `timeout`.
///
/// # Errors
/// `AppError::DatabaseConnection` when the server refuses, rejects the
/// credentials or does not answer in time.
pub async fn open_connection(
    options: &PgConnectOptions,
    timeout: Duration,
) -> AppResult<PgConnection> {
    match tokio::time::timeout(timeout, PgConnection::connect_with(options)).await {
        Ok(Ok(conn)) => {
            tracing::debug!(
                host = options.get_host(),
                database = options.get_database().unwrap_or_default(),
                "connection opened"
            );
            Ok(conn)
        }
        Ok(Err(e)) => Err(AppError::from_connect(e)),
        Err(_) => Err(AppError::DatabaseConnection(format!(
            "timed out after {}s connecting to {}:{}",
            timeout.as_secs(),
            options.get_host(),
            options.get_port()
        ))),
    }
}

/// Closes a connection, logging instead of failing.
///
/// The operation's own result is already decided when this runs; dropping
/// the connection still releases the server backend.
pub async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close connection cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("u")
            .database("app");
        let err = open_connection(&options, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }
}
