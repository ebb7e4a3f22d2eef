//! 路由模块

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// 创建对象管理路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/databases", get(handlers::list_databases))
        .route(
            "/api/databases/{name}",
            put(handlers::ensure_database)
                .delete(handlers::drop_database)
                .get(handlers::database_exists),
        )
        .route("/api/schemas", get(handlers::list_schemas))
        .route(
            "/api/schemas/{name}",
            put(handlers::ensure_schema)
                .delete(handlers::drop_schema)
                .get(handlers::schema_exists),
        )
        .route("/api/schemas/{schema}/tables", post(handlers::create_table))
        .route(
            "/api/schemas/{schema}/tables/{name}",
            put(handlers::ensure_table)
                .delete(handlers::drop_table)
                .get(handlers::table_exists),
        )
        .route(
            "/api/schemas/{schema}/tables/{name}/rows",
            post(handlers::load_rows),
        )
        .route(
            "/api/schemas/{schema}/tables/{name}/from-query",
            post(handlers::materialize_query),
        )
        .route("/api/tables", get(handlers::list_tables))
        .route("/api/users", get(handlers::list_users))
}
