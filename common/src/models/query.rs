//! SQL query models.
//!
//! Contains models for read-only query execution.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for executing a SELECT query.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryRequest {
    /// SELECT statement to execute.
    #[validate(length(min = 1, message = "SQL statement is required"))]
    pub sql: String,

    /// Database role key from the server params file (`db` or `dev_db`).
    #[serde(default)]
    pub role: Option<String>,

    /// Maximum number of rows to return (default: 1000).
    #[serde(default = "default_limit")]
    pub limit: Option<u32>,
}

fn default_limit() -> Option<u32> {
    Some(1000)
}

impl QueryRequest {
    /// A request that returns every row.
    pub fn unlimited(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            role: None,
            limit: None,
        }
    }
}

/// Result of a query execution.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    /// Column information.
    pub columns: Vec<ColumnInfo>,

    /// Row data (each row is a vector of JSON values).
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned.
    #[serde(default)]
    pub row_count: usize,

    /// Whether rows were dropped to honor the limit.
    #[serde(default)]
    pub truncated: bool,

    /// Query execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Column information in query result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Postgres type name as reported by the server.
    pub data_type: String,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn empty(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            rows: vec![],
            row_count: 0,
            truncated: false,
            execution_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_when_absent() {
        let req: QueryRequest = serde_json::from_str(r#"{"sql": "SELECT 1"}"#).unwrap();
        assert_eq!(req.limit, Some(1000));
        assert!(req.role.is_none());
    }

    #[test]
    fn test_empty_sql_fails_validation() {
        let req: QueryRequest = serde_json::from_str(r#"{"sql": ""}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
