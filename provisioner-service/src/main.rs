//! 数据库对象管理服务
//!
//! 提供 PostgreSQL 对象的幂等管理功能，包括：
//! - 数据库、模式、表的创建与删除
//! - 存在性检查
//! - 目录浏览与数据写入

mod handlers;
mod routes;
mod state;

use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig, DatabaseRole};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "provisioner-service";
const DEFAULT_PORT: u16 = 8081;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "对象管理服务 API",
        version = "0.1.0",
        description = "PostgreSQL 数据库、模式与表的幂等管理微服务"
    ),
    paths(
        handlers::list_databases,
        handlers::ensure_database,
        handlers::drop_database,
        handlers::database_exists,
        handlers::list_schemas,
        handlers::ensure_schema,
        handlers::drop_schema,
        handlers::schema_exists,
        handlers::list_tables,
        handlers::create_table,
        handlers::ensure_table,
        handlers::drop_table,
        handlers::table_exists,
        handlers::load_rows,
        handlers::materialize_query,
        handlers::list_users,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ResourceRef,
        common::models::ResourceKind,
        common::models::Outcome,
        common::models::ColumnDef,
        common::models::ColumnType,
        common::models::CreateTableRequest,
        common::models::LoadRowsRequest,
        common::models::MaterializeRequest,
        common::models::ProvisionResult,
        common::models::ExistsResult,
        common::models::LoadResult,
        common::models::DatabaseInfo,
        common::models::SchemaInfo,
        common::models::TableInfo,
        common::models::UserInfo,
        handlers::HealthResponse,
    )),
    tags(
        (name = "databases", description = "数据库端点"),
        (name = "schemas", description = "模式端点"),
        (name = "tables", description = "表端点"),
        (name = "users", description = "用户端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let mut config = AppConfig::load_with_service(SERVICE_NAME)?;
    if config.port == 0 {
        config.port = DEFAULT_PORT;
    }
    let role: DatabaseRole = std::env::var("PG_ROLE")
        .unwrap_or_else(|_| "db".to_string())
        .parse()?;

    // 创建应用状态（不建立连接）
    let state = AppState::new(config.clone(), role)?;
    info!(
        role = %role,
        database = state.connector().database(),
        "目标数据库已配置"
    );

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use common::config::ServerParams;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let params = ServerParams::from_json(
            r#"{"host": "127.0.0.1", "port": 1, "db": "app", "dev_db": "app_dev", "user": "u", "pw": "p"}"#,
        )
        .unwrap();
        let mut config = AppConfig::from_params(params);
        config.connect_timeout_secs = 1;
        create_router(AppState::new(config, DatabaseRole::Default).unwrap())
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(test_app(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["target"], "127.0.0.1:1/app");
    }

    #[tokio::test]
    async fn test_invalid_database_name_rejected_before_connecting() {
        let (status, body) =
            call(test_app(), Method::PUT, "/api/databases/bad-name", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_IDENTIFIER");
    }

    #[tokio::test]
    async fn test_invalid_table_name_on_delete() {
        let (status, _) = call(
            test_app(),
            Method::DELETE,
            "/api/schemas/public/tables/t;drop",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_table_body_validated() {
        let (status, body) = call(
            test_app(),
            Method::POST,
            "/api/schemas/public/tables",
            Some(r#"{"name": "", "columns": []}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_materialize_rejects_writes() {
        let (status, _) = call(
            test_app(),
            Method::POST,
            "/api/schemas/public/tables/copy/from-query",
            Some(r#"{"sql": "DELETE FROM users"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (status, body) = call(test_app(), Method::GET, "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/databases/{name}"]["put"].is_object());
        assert!(body["paths"]["/api/schemas/{schema}/tables/{name}/rows"]["post"].is_object());
    }
}
