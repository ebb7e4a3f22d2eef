//! Catalog lookups and DDL for provisionable objects.
//!
//! [`CatalogSession`] is the seam between the provisioner and the server:
//! the Postgres implementation runs parameterized catalog queries and DDL
//! built from allow-listed, quoted identifiers.

use std::collections::HashSet;

use async_trait::async_trait;
use common::errors::{sqlstate, AppError, AppResult};
use common::models::{ColumnDef, ResourceKind, ResourceRef};
use common::utils::Identifier;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};

/// Non-template database with the given name (case-sensitive).
pub const DATABASE_EXISTS: &str =
    "SELECT datname FROM pg_database WHERE datistemplate = false and datname = $1";

/// Schema whose name matches case-insensitively.
pub const SCHEMA_EXISTS: &str =
    "SELECT nspname FROM pg_catalog.pg_namespace WHERE LOWER(nspname) = LOWER($1)";

/// Table by name and owning schema (both case-sensitive).
pub const TABLE_EXISTS: &str = "SELECT table_name::text FROM information_schema.tables WHERE table_name = $1 AND table_schema = $2";

// SQLSTATEs raised when the object appeared after our lookup.
const DUPLICATE_DATABASE: &str = "42P04";
const DUPLICATE_SCHEMA: &str = "42P06";
const DUPLICATE_TABLE: &str = "42P07";
const UNIQUE_VIOLATION: &str = "23505";

/// One open session against the server.
#[async_trait]
pub trait CatalogSession: Send + Sized {
    /// Returns the catalog's spelling of the object matching `target`, if any.
    async fn lookup(&mut self, target: &ResourceRef) -> AppResult<Option<String>>;

    /// Issues the create statement for `target`.
    async fn create(&mut self, target: &ResourceRef, columns: &[ColumnDef]) -> AppResult<()>;

    /// Issues the drop statement for `target`, addressing it as `resolved`.
    async fn drop_resource(&mut self, target: &ResourceRef, resolved: &str) -> AppResult<()>;

    /// Ends the session.
    async fn close(self) -> AppResult<()>;
}

/// Catalog query used to look up objects of `kind`.
pub fn lookup_query(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Database => DATABASE_EXISTS,
        ResourceKind::Schema => SCHEMA_EXISTS,
        ResourceKind::Table => TABLE_EXISTS,
    }
}

/// Builds the create statement for `target`.
///
/// Schemas and tables use `IF NOT EXISTS`; Postgres has no such form for
/// databases, where a concurrent create surfaces as SQLSTATE 42P04.
pub fn create_statement(target: &ResourceRef, columns: &[ColumnDef]) -> AppResult<String> {
    match target {
        ResourceRef::Database { name } => {
            Ok(format!("CREATE DATABASE {}", Identifier::parse(name)?.quoted()))
        }
        ResourceRef::Schema { name } => Ok(format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            Identifier::parse(name)?.quoted()
        )),
        ResourceRef::Table { schema, name } => Ok(format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            Identifier::parse(schema)?.quoted(),
            Identifier::parse(name)?.quoted(),
            column_list(columns)?
        )),
    }
}

/// Builds the drop statement for `target`, addressing it as `resolved`.
///
/// `resolved` is the catalog's spelling returned by a lookup, which can
/// differ in case from the request for schemas. Table drops cascade to
/// dependent views and foreign keys; schema drops do not.
pub fn drop_statement(target: &ResourceRef, resolved: &str) -> AppResult<String> {
    let resolved = Identifier::parse(resolved)?;
    match target {
        ResourceRef::Database { .. } => Ok(format!("DROP DATABASE IF EXISTS {}", resolved.quoted())),
        ResourceRef::Schema { .. } => Ok(format!("DROP SCHEMA IF EXISTS {}", resolved.quoted())),
        ResourceRef::Table { schema, .. } => Ok(format!(
            "DROP TABLE IF EXISTS {}.{} CASCADE",
            Identifier::parse(schema)?.quoted(),
            resolved.quoted()
        )),
    }
}

/// Renders column definitions; an empty slice gives a zero-column table.
pub fn column_list(columns: &[ColumnDef]) -> AppResult<String> {
    let mut seen = HashSet::new();
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        let ident = Identifier::parse(&column.name)?;
        if !seen.insert(column.name.as_str()) {
            return Err(AppError::Validation(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        let null = if column.nullable { "" } else { " NOT NULL" };
        parts.push(format!("{} {}{}", ident.quoted(), column.data_type.sql_name(), null));
    }
    Ok(parts.join(", "))
}

/// Maps a failed create statement to the error taxonomy.
fn create_error(target: &ResourceRef, err: sqlx::Error) -> AppError {
    match sqlstate(&err).as_deref() {
        Some(DUPLICATE_DATABASE | DUPLICATE_SCHEMA | DUPLICATE_TABLE | UNIQUE_VIOLATION) => {
            AppError::RaceCondition(format!(
                "{} was created by another session after the existence check",
                target
            ))
        }
        _ => AppError::from_query(err),
    }
}

/// Session over a single Postgres connection.
pub struct PgSession {
    conn: PgConnection,
}

impl PgSession {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CatalogSession for PgSession {
    async fn lookup(&mut self, target: &ResourceRef) -> AppResult<Option<String>> {
        let mut query = sqlx::query_scalar::<_, String>(lookup_query(target.kind())).bind(target.name());
        if let Some(schema) = target.owning_schema() {
            query = query.bind(schema);
        }
        query
            .fetch_optional(&mut self.conn)
            .await
            .map_err(AppError::from_query)
    }

    async fn create(&mut self, target: &ResourceRef, columns: &[ColumnDef]) -> AppResult<()> {
        let statement = create_statement(target, columns)?;
        tracing::debug!(sql = %statement, "executing create");
        // Simple-protocol execution: CREATE DATABASE refuses to run inside
        // the implicit transaction of a prepared statement.
        self.conn
            .execute(statement.as_str())
            .await
            .map_err(|e| create_error(target, e))?;
        Ok(())
    }

    async fn drop_resource(&mut self, target: &ResourceRef, resolved: &str) -> AppResult<()> {
        let statement = drop_statement(target, resolved)?;
        tracing::debug!(sql = %statement, "executing drop");
        self.conn
            .execute(statement.as_str())
            .await
            .map_err(AppError::from_query)?;
        Ok(())
    }

    async fn close(self) -> AppResult<()> {
        self.conn.close().await.map_err(AppError::from_query)
    }
}
