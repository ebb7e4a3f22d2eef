//! Loading data into provisioned tables.
//!
//! Tables created by the provisioner may start with no columns; this module
//! fills tables that already have a shape, or creates one from a query.

use std::collections::HashSet;

use common::db::close_quietly;
use common::errors::{sqlstate, AppError, AppResult};
use common::models::ResourceRef;
use common::utils::sql_validator::strip_terminator;
use common::utils::{Identifier, SqlValidator};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::Executor;

use crate::connector::PgConnector;

const DUPLICATE_TABLE: &str = "42P07";

/// Writes rows into tables of the connected database.
pub struct TableLoader<'a> {
    connector: &'a PgConnector,
}

/// Validated `"schema"."table"` pair.
fn qualified_table(target: &ResourceRef) -> AppResult<String> {
    match target {
        ResourceRef::Table { schema, name } => Ok(format!(
            "{}.{}",
            Identifier::parse(schema)?.quoted(),
            Identifier::parse(name)?.quoted()
        )),
        other => Err(AppError::Validation(format!(
            "rows can only be loaded into tables, not {}",
            other.kind()
        ))),
    }
}

/// Builds the bulk insert statement.
///
/// Rows travel as a single `jsonb` array bound to `$1`; the server converts
/// each field to the column's declared type through the table's row type.
pub fn insert_statement(target: &ResourceRef, columns: &[String]) -> AppResult<String> {
    let table = qualified_table(target)?;
    if columns.is_empty() {
        return Err(AppError::Validation("at least one column is required".into()));
    }
    let mut seen = HashSet::new();
    let mut quoted = Vec::with_capacity(columns.len());
    for column in columns {
        let ident = Identifier::parse(column)?;
        if !seen.insert(column.as_str()) {
            return Err(AppError::Validation(format!("duplicate column '{}'", column)));
        }
        quoted.push(ident.quoted());
    }
    let list = quoted.join(", ");
    Ok(format!(
        "INSERT INTO {table} ({list}) SELECT {list} FROM jsonb_populate_recordset(NULL::{table}, $1)"
    ))
}

/// Zips each row with the column names into a JSON array of objects.
pub fn rows_to_records(columns: &[String], rows: &[Vec<Value>]) -> AppResult<Value> {
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(AppError::Validation(format!(
                "row {} has {} values, expected {}",
                index,
                row.len(),
                columns.len()
            )));
        }
        let record: Map<String, Value> = columns.iter().cloned().zip(row.iter().cloned()).collect();
        records.push(Value::Object(record));
    }
    Ok(Value::Array(records))
}

/// Builds `CREATE TABLE ... AS <select>` after checking the query is read-only.
pub fn materialize_statement(target: &ResourceRef, select_sql: &str) -> AppResult<String> {
    let table = qualified_table(target)?;
    SqlValidator::validate_select(select_sql)?;
    Ok(format!("CREATE TABLE {} AS {}", table, strip_terminator(select_sql)))
}

impl<'a> TableLoader<'a> {
    pub fn new(connector: &'a PgConnector) -> Self {
        Self { connector }
    }

    /// Inserts `rows` into an existing table; returns the number of rows written.
    ///
    /// All rows go in one statement, so either every row lands or none does.
    pub async fn load_rows(
        &self,
        target: &ResourceRef,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> AppResult<u64> {
        let statement = insert_statement(target, columns)?;
        let records = rows_to_records(columns, rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connector.open().await?;
        let result = sqlx::query(&statement)
            .bind(Json(records))
            .execute(&mut conn)
            .await
            .map(|done| done.rows_affected())
            .map_err(AppError::from_query);
        close_quietly(conn).await;

        let inserted = result?;
        tracing::info!(resource = %target, rows = inserted, "rows loaded");
        Ok(inserted)
    }

    /// Creates `target` from the result of a SELECT; returns the rows written.
    ///
    /// # Errors
    /// `Validation` when the table already exists, `UnsafeSql`/`Validation`
    /// when the query is not a single read-only statement.
    pub async fn materialize_query(&self, target: &ResourceRef, select_sql: &str) -> AppResult<u64> {
        let statement = materialize_statement(target, select_sql)?;

        let mut conn = self.connector.open().await?;
        let result = conn.execute(statement.as_str()).await;
        close_quietly(conn).await;

        let written = match result {
            Ok(done) => done.rows_affected(),
            Err(e) if sqlstate(&e).as_deref() == Some(DUPLICATE_TABLE) => {
                return Err(AppError::Validation(format!("{} already exists", target)))
            }
            Err(e) => return Err(AppError::from_query(e)),
        };
        tracing::info!(resource = %target, rows = written, "query materialized");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::{AppConfig, DatabaseRole, ServerParams};
    use serde_json::json;

    fn unreachable_connector() -> PgConnector {
        let params = ServerParams::from_json(
            r#"{"host":"127.0.0.1","port":1,"user":"u","pw":"p","db":"app"}"#,
        )
        .unwrap();
        let mut config = AppConfig::from_params(params);
        config.connect_timeout_secs = 1;
        PgConnector::new(&config, DatabaseRole::Default).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement(&ResourceRef::table("s", "t"), &cols(&["id", "name"])).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"s\".\"t\" (\"id\", \"name\") SELECT \"id\", \"name\" \
             FROM jsonb_populate_recordset(NULL::\"s\".\"t\", $1)"
        );
    }

    #[test]
    fn test_insert_requires_table_and_columns() {
        let err = insert_statement(&ResourceRef::schema("s"), &cols(&["id"])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = insert_statement(&ResourceRef::table("s", "t"), &[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = insert_statement(&ResourceRef::table("s", "t"), &cols(&["id", "id"])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = insert_statement(&ResourceRef::table("s", "t"), &cols(&["a b"])).unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_rows_to_records() {
        let records = rows_to_records(
            &cols(&["id", "name", "tags"]),
            &[
                vec![json!(1), json!("a"), json!(["x"])],
                vec![json!(2), Value::Null, json!({"k": 1})],
            ],
        )
        .unwrap();
        assert_eq!(
            records,
            json!([
                {"id": 1, "name": "a", "tags": ["x"]},
                {"id": 2, "name": null, "tags": {"k": 1}}
            ])
        );
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = rows_to_records(&cols(&["id", "name"]), &[vec![json!(1)]]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_materialize_statement() {
        let sql = materialize_statement(
            &ResourceRef::table("reports", "daily"),
            "SELECT day, count(*) FROM events GROUP BY day;",
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"reports\".\"daily\" AS SELECT day, count(*) FROM events GROUP BY day"
        );
    }

    #[test]
    fn test_materialize_rejects_writes() {
        let err = materialize_statement(&ResourceRef::table("s", "t"), "DELETE FROM users")
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = materialize_statement(&ResourceRef::table("s", "t"), "SELECT 1; DROP TABLE x")
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_rows_is_noop_without_connecting() {
        let connector = unreachable_connector();
        let written = TableLoader::new(&connector)
            .load_rows(&ResourceRef::table("s", "t"), &cols(&["id", "name"]), &[])
            .await
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_rows_need_a_server() {
        let connector = unreachable_connector();
        let err = TableLoader::new(&connector)
            .load_rows(&ResourceRef::table("s", "t"), &cols(&["id"]), &[vec![json!(1)]])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }
}
