//! Catalog introspection models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Database on the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Number of tables; only known for the connected database.
    pub tables_count: Option<u32>,
    /// Size in megabytes; absent without CONNECT privilege.
    pub size_mb: Option<f64>,
}

/// Schema (namespace) in the connected database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchemaInfo {
    pub name: String,
    pub owner: String,
}

/// Table in the connected database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
}

/// Row of `pg_catalog.pg_user`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub name: String,
    pub superuser: bool,
    pub create_db: bool,
}
