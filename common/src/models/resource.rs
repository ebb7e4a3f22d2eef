//! Provisionable catalog objects.
//!
//! A [`ResourceRef`] names a database, schema or table; the provisioner turns
//! it into catalog lookups and DDL after validating every identifier.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::utils::Identifier;

/// Kind of catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Schema,
    Table,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Database => write!(f, "database"),
            ResourceKind::Schema => write!(f, "schema"),
            ResourceKind::Table => write!(f, "table"),
        }
    }
}

/// Reference to a catalog object.
///
/// Construction does not validate; [`ResourceRef::validate_identifiers`]
/// runs before anything touches the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceRef {
    Database { name: String },
    Schema { name: String },
    Table { schema: String, name: String },
}

impl ResourceRef {
    pub fn database(name: impl Into<String>) -> Self {
        ResourceRef::Database { name: name.into() }
    }

    pub fn schema(name: impl Into<String>) -> Self {
        ResourceRef::Schema { name: name.into() }
    }

    pub fn table(schema: impl Into<String>, name: impl Into<String>) -> Self {
        ResourceRef::Table {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Database { .. } => ResourceKind::Database,
            ResourceRef::Schema { .. } => ResourceKind::Schema,
            ResourceRef::Table { .. } => ResourceKind::Table,
        }
    }

    /// The object's own name (without the owning schema).
    pub fn name(&self) -> &str {
        match self {
            ResourceRef::Database { name }
            | ResourceRef::Schema { name }
            | ResourceRef::Table { name, .. } => name,
        }
    }

    /// Owning schema, for tables.
    pub fn owning_schema(&self) -> Option<&str> {
        match self {
            ResourceRef::Table { schema, .. } => Some(schema),
            _ => None,
        }
    }

    /// Runs every identifier through the allow-list.
    pub fn validate_identifiers(&self) -> AppResult<()> {
        if let Some(schema) = self.owning_schema() {
            Identifier::parse(schema)?;
        }
        Identifier::parse(self.name())?;
        Ok(())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Database { name } => write!(f, "database {}", name),
            ResourceRef::Schema { name } => write!(f, "schema {}", name),
            ResourceRef::Table { schema, name } => write!(f, "table {}.{}", schema, name),
        }
    }
}

/// Result of an ensure-exists / ensure-absent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    AlreadyExists,
    Dropped,
    AlreadyAbsent,
}

impl Outcome {
    /// Whether the call changed the catalog.
    pub fn mutated(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Dropped)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::AlreadyExists => write!(f, "already exists"),
            Outcome::Dropped => write!(f, "dropped"),
            Outcome::AlreadyAbsent => write!(f, "already absent"),
        }
    }
}

/// Column types accepted in table definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Bigint,
    Double,
    Numeric,
    Boolean,
    Date,
    Timestamp,
    Timestamptz,
    Uuid,
    Jsonb,
}

impl ColumnType {
    /// Postgres type name used in DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Bigint => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Timestamptz => "TIMESTAMPTZ",
            ColumnType::Uuid => "UUID",
            ColumnType::Jsonb => "JSONB",
        }
    }
}

impl std::str::FromStr for ColumnType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "text" => ColumnType::Text,
            "integer" | "int" => ColumnType::Integer,
            "bigint" => ColumnType::Bigint,
            "double" => ColumnType::Double,
            "numeric" => ColumnType::Numeric,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "timestamp" => ColumnType::Timestamp,
            "timestamptz" => ColumnType::Timestamptz,
            "uuid" => ColumnType::Uuid,
            "jsonb" | "json" => ColumnType::Jsonb,
            other => {
                return Err(AppError::Validation(format!(
                    "unsupported column type '{}'",
                    other
                )))
            }
        };
        Ok(ty)
    }
}

/// Column of a table created with an explicit definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

impl std::str::FromStr for ColumnDef {
    type Err = AppError;

    /// Parses `name:type` or `name:type:null` / `name:type:notnull`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default();
        let data_type = parts
            .next()
            .ok_or_else(|| AppError::Validation(format!("column '{}' needs a type", s)))?
            .parse()?;
        let nullable = match parts.next() {
            None | Some("null") => true,
            Some("notnull") => false,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "unknown column modifier '{}'",
                    other
                )))
            }
        };
        if parts.next().is_some() {
            return Err(AppError::Validation(format!("malformed column '{}'", s)));
        }
        Ok(Self {
            name: name.to_string(),
            data_type,
            nullable,
        })
    }
}

/// Request body for creating a table with columns.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTableRequest {
    #[validate(length(min = 1, max = 63, message = "Table name must be 1-63 characters"))]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

/// Request body for bulk-loading rows.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoadRowsRequest {
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Request body for materializing a query into a table.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MaterializeRequest {
    #[validate(length(min = 1, message = "SQL statement is required"))]
    pub sql: String,
}

/// Response body for provisioning endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProvisionResult {
    pub resource: ResourceRef,
    pub outcome: Outcome,
}

/// Response body for existence checks.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExistsResult {
    pub resource: ResourceRef,
    pub exists: bool,
}

/// Response body for load endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoadResult {
    pub resource: ResourceRef,
    pub rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifiers_covers_owning_schema() {
        assert!(ResourceRef::table("test_schema", "test_table")
            .validate_identifiers()
            .is_ok());
        assert!(ResourceRef::table("bad schema", "test_table")
            .validate_identifiers()
            .is_err());
        assert!(ResourceRef::database("test_db;--")
            .validate_identifiers()
            .is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceRef::table("s", "t").to_string(), "table s.t");
        assert_eq!(ResourceRef::schema("s").to_string(), "schema s");
        assert_eq!(Outcome::AlreadyAbsent.to_string(), "already absent");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(ResourceRef::table("s", "t")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "table", "schema": "s", "name": "t"}));
        let outcome = serde_json::to_value(Outcome::AlreadyExists).unwrap();
        assert_eq!(outcome, "already_exists");
    }

    #[test]
    fn test_column_def_parse() {
        let col: ColumnDef = "id:bigint:notnull".parse().unwrap();
        assert_eq!(col, ColumnDef::new("id", ColumnType::Bigint).not_null());
        let col: ColumnDef = "note:text".parse().unwrap();
        assert!(col.nullable);
        assert!("id".parse::<ColumnDef>().is_err());
        assert!("id:varchar".parse::<ColumnDef>().is_err());
        assert!("id:int:maybe".parse::<ColumnDef>().is_err());
    }

    #[test]
    fn test_column_def_json_defaults_to_nullable() {
        let col: ColumnDef =
            serde_json::from_str(r#"{"name": "amount", "data_type": "numeric"}"#).unwrap();
        assert!(col.nullable);
        assert_eq!(col.data_type.sql_name(), "NUMERIC");
    }
}
