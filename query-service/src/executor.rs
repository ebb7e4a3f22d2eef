//! 查询执行模块
//!
//! 每次查询独立打开只读连接，执行完毕后关闭。

use std::path::{Path, PathBuf};
use std::time::Instant;

use common::config::{AppConfig, DatabaseRole};
use common::db::{close_quietly, open_connection};
use common::errors::{AppError, AppResult};
use common::models::query::{ColumnInfo, QueryRequest, QueryResult};
use common::utils::sql_validator::strip_terminator;
use common::utils::SqlValidator;
use serde_json::{Number, Value};
use sqlx::postgres::{PgColumn, PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};

/// SQL 文本来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlSource {
    Inline(String),
    File(PathBuf),
}

impl SqlSource {
    /// 以 `.sql` 结尾的参数视为文件路径，其余视为 SQL 语句本身
    pub fn parse(arg: &str) -> Self {
        if arg.trim_end().ends_with(".sql") {
            SqlSource::File(PathBuf::from(arg.trim()))
        } else {
            SqlSource::Inline(arg.to_string())
        }
    }

    /// 返回 SQL 文本，必要时读取文件
    pub fn load(&self) -> AppResult<String> {
        match self {
            SqlSource::Inline(sql) => Ok(sql.clone()),
            SqlSource::File(path) => read_sql_file(path),
        }
    }
}

fn read_sql_file(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| AppError::Validation(format!("cannot read {}: {}", path.display(), e)))
}

/// SQL 查询执行服务
#[derive(Debug, Clone)]
pub struct QueryService {
    config: AppConfig,
}

impl QueryService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// 执行只读查询
    ///
    /// 未指定 role 时使用 `dev_db`。
    pub async fn execute(&self, req: &QueryRequest) -> AppResult<QueryResult> {
        SqlValidator::validate_select(&req.sql)?;
        let role = match req.role.as_deref() {
            Some(key) => key.parse()?,
            None => DatabaseRole::Dev,
        };

        let started = Instant::now();
        let options = self.connect_options(role)?;
        let mut conn = open_connection(&options, self.config.connect_timeout()).await?;
        // 无参数的 &str 走简单查询协议，所有列以文本格式返回
        let fetched = fetch(&mut conn, strip_terminator(&req.sql)).await;
        close_quietly(conn).await;
        let (columns, rows) = fetched.map_err(AppError::from_query)?;

        let mut result = rows_to_result(columns, &rows, req.limit.map(|l| l as usize))?;
        result.execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            role = %role,
            rows = result.row_count,
            truncated = result.truncated,
            elapsed_ms = result.execution_time_ms,
            "query executed"
        );
        Ok(result)
    }

    /// 连接参数：会话内所有事务默认只读，写操作由服务器拒绝
    fn connect_options(&self, role: DatabaseRole) -> AppResult<PgConnectOptions> {
        Ok(self
            .config
            .params
            .connect_options(role)?
            .options([("default_transaction_read_only", "on")]))
    }
}

/// 执行查询并返回列信息与行
///
/// 列信息随行返回，结果为空时单独 describe。
async fn fetch(
    conn: &mut PgConnection,
    sql: &str,
) -> Result<(Vec<ColumnInfo>, Vec<PgRow>), sqlx::Error> {
    let rows = Executor::fetch_all(&mut *conn, sql).await?;
    let columns = match rows.first() {
        Some(row) => column_info(row.columns()),
        None => column_info(Executor::describe(&mut *conn, sql).await?.columns()),
    };
    Ok((columns, rows))
}

fn column_info(columns: &[PgColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            data_type: c.type_info().name().to_string(),
        })
        .collect()
}

fn rows_to_result(
    columns: Vec<ColumnInfo>,
    rows: &[PgRow],
    limit: Option<usize>,
) -> AppResult<QueryResult> {
    let keep = limit.unwrap_or(rows.len()).min(rows.len());
    let mut out = Vec::with_capacity(keep);
    for row in &rows[..keep] {
        let mut values = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let raw = row.try_get_raw(index).map_err(AppError::from_query)?;
            if raw.is_null() {
                values.push(Value::Null);
                continue;
            }
            let text: String = row.try_get_unchecked(index).map_err(AppError::from_query)?;
            values.push(text_to_json(&column.data_type, text));
        }
        out.push(values);
    }

    let mut result = QueryResult::empty(columns);
    result.row_count = out.len();
    result.truncated = keep < rows.len();
    result.rows = out;
    Ok(result)
}

/// 按 Postgres 类型名将文本格式的值转换为 JSON
///
/// NUMERIC 保持字符串，不损失精度。
pub fn text_to_json(type_name: &str, text: String) -> Value {
    match type_name {
        "BOOL" => match text.as_str() {
            "t" => Value::Bool(true),
            "f" => Value::Bool(false),
            _ => Value::String(text),
        },
        "INT2" | "INT4" | "INT8" | "OID" => text
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::String(text)),
        "FLOAT4" | "FLOAT8" => match text.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(text),
        },
        "JSON" | "JSONB" => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::ServerParams;
    use serde_json::json;

    fn service() -> QueryService {
        let params = ServerParams::from_json(
            r#"{"host":"127.0.0.1","port":1,"user":"u","pw":"p","db":"app","dev_db":"app_dev"}"#,
        )
        .unwrap();
        let mut config = AppConfig::from_params(params);
        config.connect_timeout_secs = 1;
        QueryService::new(config)
    }

    #[test]
    fn test_sql_source_parse() {
        assert_eq!(
            SqlSource::parse("queries/daily.sql"),
            SqlSource::File(PathBuf::from("queries/daily.sql"))
        );
        assert_eq!(
            SqlSource::parse("SELECT * FROM t"),
            SqlSource::Inline("SELECT * FROM t".to_string())
        );
    }

    #[test]
    fn test_sql_source_reads_file() {
        let path = std::env::temp_dir().join(format!("pg-query-{}.sql", uuid::Uuid::new_v4()));
        std::fs::write(&path, "SELECT 1 AS one;\n").unwrap();
        let sql = SqlSource::parse(path.to_str().unwrap()).load().unwrap();
        assert_eq!(sql, "SELECT 1 AS one;\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_sql_file_is_validation_error() {
        let err = SqlSource::parse("/nonexistent/dir/q.sql").load().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_text_to_json() {
        assert_eq!(text_to_json("BOOL", "t".into()), json!(true));
        assert_eq!(text_to_json("INT8", "-42".into()), json!(-42));
        assert_eq!(text_to_json("FLOAT8", "1.5".into()), json!(1.5));
        assert_eq!(text_to_json("FLOAT8", "NaN".into()), json!("NaN"));
        assert_eq!(text_to_json("NUMERIC", "12.3400".into()), json!("12.3400"));
        assert_eq!(text_to_json("JSONB", r#"{"a": [1]}"#.into()), json!({"a": [1]}));
        assert_eq!(text_to_json("DATE", "2024-01-31".into()), json!("2024-01-31"));
    }

    #[tokio::test]
    async fn test_writes_rejected_before_connecting() {
        let err = service()
            .execute(&QueryRequest::unlimited("DROP TABLE users"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service()
            .execute(&QueryRequest::unlimited("SELECT 1; DELETE FROM users"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_select_into_rejected_before_connecting() {
        let err = service()
            .execute(&QueryRequest::unlimited("SELECT * INTO stolen FROM users"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsafeSql(_)));
    }

    #[test]
    fn test_sessions_are_read_only() {
        let options = service().connect_options(DatabaseRole::Dev).unwrap();
        assert_eq!(options.get_database(), Some("app_dev"));
        assert!(options
            .get_options()
            .unwrap_or_default()
            .contains("default_transaction_read_only=on"));
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let mut req = QueryRequest::unlimited("SELECT 1");
        req.role = Some("prod".to_string());
        let err = service().execute(&req).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let err = service()
            .execute(&QueryRequest::unlimited("SELECT 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }

    #[test]
    fn test_empty_rows_keep_columns() {
        let columns = vec![ColumnInfo {
            name: "id".to_string(),
            data_type: "INT4".to_string(),
        }];
        let result = rows_to_result(columns, &[], Some(10)).unwrap();
        assert_eq!(result.row_count, 0);
        assert!(!result.truncated);
        assert_eq!(result.columns[0].name, "id");
    }
}
