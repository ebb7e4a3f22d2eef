//! SQL 查询执行服务
//!
//! 提供只读 SQL 查询功能，包括：
//! - 在 `db` 或 `dev_db` 上执行 SELECT
//! - 结果转换为 JSON
//! - 查询语句校验

mod handlers;
mod routes;
mod state;

use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "query-service";
const DEFAULT_PORT: u16 = 8082;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "查询服务 API",
        version = "0.1.0",
        description = "只读 SQL 查询执行微服务"
    ),
    paths(
        handlers::execute_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::QueryRequest,
        common::models::QueryResult,
        common::models::ColumnInfo,
        handlers::HealthResponse,
    )),
    tags(
        (name = "query", description = "查询执行端点"),
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

    let state = AppState::new(config.clone());
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
    use axum::http::{Request, StatusCode};
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
        create_router(AppState::new(config))
    }

    async fn post_query(body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_write_statement_rejected() {
        let (status, body) = post_query(r#"{"sql": "UPDATE users SET admin = true"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_empty_sql_rejected() {
        let (status, body) = post_query(r#"{"sql": ""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_database_is_bad_gateway() {
        let (status, body) = post_query(r#"{"sql": "SELECT 1"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "CONNECTION_ERROR");
    }
}
