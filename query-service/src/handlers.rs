//! Handler模块

use std::time::Instant;

use axum::{
    extract::State,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::AppError;
use common::middleware::RequestId;
use common::models::query::{QueryRequest, QueryResult};
use common::response::ApiResponse;
use crate::state::AppState;

const SERVICE_NAME: &str = "query-service";

/// 执行只读 SQL 查询
#[utoipa::path(
    post,
    path = "/api/query",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询执行成功", body = ApiResponse<QueryResult>),
        (status = 400, description = "SQL 无效或校验错误"),
        (status = 502, description = "数据库不可达")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    let started = Instant::now();
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let result = state.service.execute(&req).await?;
    Ok(Json(
        ApiResponse::ok_with_service(result, SERVICE_NAME)
            .with_request_id(request_id.as_str())
            .with_duration(started.elapsed().as_millis() as u64),
    ))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        target: format!("{}:{}", state.config.params.host, state.config.params.port),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub target: String,
}
