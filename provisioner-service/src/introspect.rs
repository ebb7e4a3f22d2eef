//! Read-only catalog listings.

use common::db::close_quietly;
use common::errors::{AppError, AppResult};
use common::models::{DatabaseInfo, SchemaInfo, TableInfo, UserInfo};

use crate::connector::PgConnector;

// information_schema only covers the connected database, so other databases
// get no table count. Size needs CONNECT on the database.
const LIST_DATABASES: &str = "SELECT d.datname AS name,
        CASE WHEN d.datname = current_database()
             THEN (SELECT count(*) FROM information_schema.tables)
        END AS tables_count,
        CASE WHEN has_database_privilege(d.datname, 'CONNECT')
             THEN (pg_database_size(d.datname) / 1024.0 / 1024.0)::float8
        END AS size_mb
     FROM pg_database d
     WHERE d.datistemplate = false
     ORDER BY d.datname";

const LIST_SCHEMAS: &str = "SELECT n.nspname AS name, pg_get_userbyid(n.nspowner) AS owner
     FROM pg_catalog.pg_namespace n
     WHERE n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
       AND n.nspname NOT LIKE 'pg\\_temp\\_%'
       AND n.nspname NOT LIKE 'pg\\_toast\\_temp\\_%'
     ORDER BY n.nspname";

const LIST_TABLES: &str = "SELECT table_schema::text AS schema, table_name::text AS name
     FROM information_schema.tables
     ORDER BY table_schema, table_name";

const LIST_USERS: &str =
    "SELECT usename AS name, usesuper AS superuser, usecreatedb AS create_db FROM pg_catalog.pg_user ORDER BY usename";

#[derive(sqlx::FromRow)]
struct DatabaseRow {
    name: String,
    tables_count: Option<i64>,
    size_mb: Option<f64>,
}

impl TryFrom<DatabaseRow> for DatabaseInfo {
    type Error = AppError;

    fn try_from(row: DatabaseRow) -> AppResult<Self> {
        let tables_count = row
            .tables_count
            .map(u32::try_from)
            .transpose()
            .map_err(|_| {
                AppError::Internal(format!("table count of {} out of range", row.name))
            })?;
        Ok(Self {
            name: row.name,
            tables_count,
            size_mb: row.size_mb,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SchemaRow {
    name: String,
    owner: String,
}

#[derive(sqlx::FromRow)]
struct TableRow {
    schema: String,
    name: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    name: String,
    superuser: Option<bool>,
    create_db: Option<bool>,
}

/// Lists catalog contents visible to the configured role.
pub struct Inspector<'a> {
    connector: &'a PgConnector,
}

impl<'a> Inspector<'a> {
    pub fn new(connector: &'a PgConnector) -> Self {
        Self { connector }
    }

    /// Non-template databases.
    ///
    /// Only the connected database carries a table count; size is missing
    /// where the role lacks CONNECT.
    pub async fn list_databases(&self) -> AppResult<Vec<DatabaseInfo>> {
        let rows: Vec<DatabaseRow> = self.fetch(LIST_DATABASES).await?;
        rows.into_iter().map(DatabaseInfo::try_from).collect()
    }

    /// User schemas of the connected database.
    pub async fn list_schemas(&self) -> AppResult<Vec<SchemaInfo>> {
        let rows: Vec<SchemaRow> = self.fetch(LIST_SCHEMAS).await?;
        Ok(rows
            .into_iter()
            .map(|r| SchemaInfo {
                name: r.name,
                owner: r.owner,
            })
            .collect())
    }

    /// Every table of the connected database, ordered by schema and name.
    pub async fn list_tables(&self) -> AppResult<Vec<TableInfo>> {
        let rows: Vec<TableRow> = self.fetch(LIST_TABLES).await?;
        Ok(rows
            .into_iter()
            .map(|r| TableInfo {
                schema: r.schema,
                name: r.name,
            })
            .collect())
    }

    /// Login roles from `pg_catalog.pg_user`.
    pub async fn list_users(&self) -> AppResult<Vec<UserInfo>> {
        let rows: Vec<UserRow> = self.fetch(LIST_USERS).await?;
        Ok(rows
            .into_iter()
            .map(|r| UserInfo {
                name: r.name,
                superuser: r.superuser.unwrap_or(false),
                create_db: r.create_db.unwrap_or(false),
            })
            .collect())
    }

    async fn fetch<T>(&self, sql: &'static str) -> AppResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut conn = self.connector.open().await?;
        let result = sqlx::query_as::<_, T>(sql)
            .fetch_all(&mut conn)
            .await
            .map_err(AppError::from_query);
        close_quietly(conn).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tables_count: Option<i64>, size_mb: Option<f64>) -> DatabaseRow {
        DatabaseRow {
            name: "app".to_string(),
            tables_count,
            size_mb,
        }
    }

    #[test]
    fn test_database_listing_guards() {
        assert!(LIST_DATABASES.contains("current_database()"));
        assert!(LIST_DATABASES.contains("has_database_privilege(d.datname, 'CONNECT')"));
        assert!(!LIST_DATABASES.contains("table_catalog"));
    }

    #[test]
    fn test_other_databases_have_no_count() {
        let info = DatabaseInfo::try_from(row(None, None)).unwrap();
        assert_eq!(info.tables_count, None);
        assert_eq!(info.size_mb, None);

        let info = DatabaseInfo::try_from(row(Some(12), Some(7.5))).unwrap();
        assert_eq!(info.tables_count, Some(12));
        assert_eq!(info.size_mb, Some(7.5));
    }

    #[test]
    fn test_out_of_range_count_is_an_error() {
        let err = DatabaseInfo::try_from(row(Some(i64::from(u32::MAX) + 1), None)).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        let err = DatabaseInfo::try_from(row(Some(-1), None)).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
