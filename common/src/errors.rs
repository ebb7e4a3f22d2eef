//! Error types shared by every service.
//!
//! Each variant maps to a stable error code and an HTTP status so the
//! HTTP surfaces and the command-line tools report failures the same way.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Server-params file missing, unreadable or malformed, or an unknown role key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Server unreachable or credentials rejected.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    /// A statement was rejected by the server.
    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    /// DDL succeeded but the follow-up catalog check disagrees.
    #[error("consistency check failed: {0}")]
    Consistency(String),

    /// Another session created or dropped the object between check and DDL.
    #[error("concurrent modification: {0}")]
    RaceCondition(String),

    /// Identifier outside the `[A-Za-z0-9_]` allow-list.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Malformed request.
    #[error("validation error: {0}")]
    Validation(String),

    /// Statement rejected by the SQL validator.
    #[error("unsafe sql: {0}")]
    UnsafeSql(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseConnection(_) => "CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "QUERY_ERROR",
            AppError::Consistency(_) => "CONSISTENCY_ERROR",
            AppError::RaceCondition(_) => "RACE_CONDITION",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnsafeSql(_) => "UNSAFE_SQL",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status used when the error crosses an HTTP boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidIdentifier(_) | AppError::Validation(_) | AppError::UnsafeSql(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RaceCondition(_) => StatusCode::CONFLICT,
            AppError::DatabaseConnection(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::DatabaseQuery(_)
            | AppError::Consistency(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classifies a failure raised while opening a connection.
    pub fn from_connect(err: sqlx::Error) -> Self {
        AppError::DatabaseConnection(err.to_string())
    }

    /// Classifies a failure raised by a statement on an open connection.
    ///
    /// Transport failures mid-session are reported as connection errors so the
    /// caller can tell "server went away" apart from "server said no".
    pub fn from_query(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                AppError::DatabaseConnection(err.to_string())
            }
            other => AppError::DatabaseQuery(other.to_string()),
        }
    }
}

/// SQLSTATE reported by the server for a failed statement, if any.
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
