//! Handler模块

use std::time::Instant;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::middleware::RequestId;
use common::models::{
    ColumnDef, CreateTableRequest, DatabaseInfo, ExistsResult, LoadResult, LoadRowsRequest,
    MaterializeRequest, ProvisionResult, ResourceRef, SchemaInfo, TableInfo, UserInfo,
};
use common::response::ApiResponse;
use provisioner_service::introspect::Inspector;
use provisioner_service::loader::TableLoader;

use crate::state::AppState;

const SERVICE_NAME: &str = "provisioner-service";

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn respond<T: Serialize>(data: T, request_id: &RequestId, started: Instant) -> Json<ApiResponse<T>> {
    Json(
        ApiResponse::ok_with_service(data, SERVICE_NAME)
            .with_request_id(request_id.as_str())
            .with_duration(started.elapsed().as_millis() as u64),
    )
}

fn validated<T: Validate>(req: T) -> AppResult<T> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(req)
}

async fn ensure_exists(
    state: &AppState,
    resource: ResourceRef,
    columns: &[ColumnDef],
    request_id: &RequestId,
) -> ApiResult<ProvisionResult> {
    let started = Instant::now();
    let outcome = state.provisioner.ensure_exists_with(&resource, columns).await?;
    Ok(respond(ProvisionResult { resource, outcome }, request_id, started))
}

async fn ensure_absent(
    state: &AppState,
    resource: ResourceRef,
    request_id: &RequestId,
) -> ApiResult<ProvisionResult> {
    let started = Instant::now();
    let outcome = state.provisioner.ensure_absent(&resource).await?;
    Ok(respond(ProvisionResult { resource, outcome }, request_id, started))
}

async fn exists(
    state: &AppState,
    resource: ResourceRef,
    request_id: &RequestId,
) -> ApiResult<ExistsResult> {
    let started = Instant::now();
    let exists = state.provisioner.exists(&resource).await?;
    Ok(respond(ExistsResult { resource, exists }, request_id, started))
}

// ============== 数据库 ==============

/// 列出服务器上的数据库
#[utoipa::path(
    get,
    path = "/api/databases",
    tag = "databases",
    responses(
        (status = 200, description = "数据库列表", body = ApiResponse<Vec<DatabaseInfo>>)
    )
)]
pub async fn list_databases(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Vec<DatabaseInfo>> {
    let started = Instant::now();
    let data = Inspector::new(state.connector()).list_databases().await?;
    Ok(respond(data, &request_id, started))
}

/// 确保数据库存在
#[utoipa::path(
    put,
    path = "/api/databases/{name}",
    tag = "databases",
    params(("name" = String, Path, description = "数据库名")),
    responses(
        (status = 200, description = "created 或 already_exists", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称不合法"),
        (status = 409, description = "并发创建")
    )
)]
pub async fn ensure_database(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> ApiResult<ProvisionResult> {
    ensure_exists(&state, ResourceRef::database(name), &[], &request_id).await
}

/// 确保数据库不存在
#[utoipa::path(
    delete,
    path = "/api/databases/{name}",
    tag = "databases",
    params(("name" = String, Path, description = "数据库名")),
    responses(
        (status = 200, description = "dropped 或 already_absent", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称不合法")
    )
)]
pub async fn drop_database(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> ApiResult<ProvisionResult> {
    ensure_absent(&state, ResourceRef::database(name), &request_id).await
}

/// 检查数据库是否存在
#[utoipa::path(
    get,
    path = "/api/databases/{name}",
    tag = "databases",
    params(("name" = String, Path, description = "数据库名")),
    responses(
        (status = 200, description = "存在性", body = ApiResponse<ExistsResult>)
    )
)]
pub async fn database_exists(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> ApiResult<ExistsResult> {
    exists(&state, ResourceRef::database(name), &request_id).await
}

// ============== 模式 ==============

/// 列出当前数据库中的模式
#[utoipa::path(
    get,
    path = "/api/schemas",
    tag = "schemas",
    responses(
        (status = 200, description = "模式列表", body = ApiResponse<Vec<SchemaInfo>>)
    )
)]
pub async fn list_schemas(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Vec<SchemaInfo>> {
    let started = Instant::now();
    let data = Inspector::new(state.connector()).list_schemas().await?;
    Ok(respond(data, &request_id, started))
}

/// 确保模式存在（名称比较不区分大小写）
#[utoipa::path(
    put,
    path = "/api/schemas/{name}",
    tag = "schemas",
    params(("name" = String, Path, description = "模式名")),
    responses(
        (status = 200, description = "created 或 already_exists", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称不合法")
    )
)]
pub async fn ensure_schema(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> ApiResult<ProvisionResult> {
    ensure_exists(&state, ResourceRef::schema(name), &[], &request_id).await
}

/// 确保模式不存在（非空模式会报错）
#[utoipa::path(
    delete,
    path = "/api/schemas/{name}",
    tag = "schemas",
    params(("name" = String, Path, description = "模式名")),
    responses(
        (status = 200, description = "dropped 或 already_absent", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称不合法")
    )
)]
pub async fn drop_schema(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> ApiResult<ProvisionResult> {
    ensure_absent(&state, ResourceRef::schema(name), &request_id).await
}

/// 检查模式是否存在
#[utoipa::path(
    get,
    path = "/api/schemas/{name}",
    tag = "schemas",
    params(("name" = String, Path, description = "模式名")),
    responses(
        (status = 200, description = "存在性", body = ApiResponse<ExistsResult>)
    )
)]
pub async fn schema_exists(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> ApiResult<ExistsResult> {
    exists(&state, ResourceRef::schema(name), &request_id).await
}

// ============== 表 ==============

/// 列出当前数据库中的表
#[utoipa::path(
    get,
    path = "/api/tables",
    tag = "tables",
    responses(
        (status = 200, description = "表列表", body = ApiResponse<Vec<TableInfo>>)
    )
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Vec<TableInfo>> {
    let started = Instant::now();
    let data = Inspector::new(state.connector()).list_tables().await?;
    Ok(respond(data, &request_id, started))
}

/// 按列定义创建表（已存在则不变）
#[utoipa::path(
    post,
    path = "/api/schemas/{schema}/tables",
    tag = "tables",
    params(("schema" = String, Path, description = "所属模式")),
    request_body = CreateTableRequest,
    responses(
        (status = 200, description = "created 或 already_exists", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称或列定义不合法")
    )
)]
pub async fn create_table(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(schema): Path<String>,
    Json(req): Json<CreateTableRequest>,
) -> ApiResult<ProvisionResult> {
    let req = validated(req)?;
    ensure_exists(&state, ResourceRef::table(schema, req.name), &req.columns, &request_id).await
}

/// 确保表存在（无列）
#[utoipa::path(
    put,
    path = "/api/schemas/{schema}/tables/{name}",
    tag = "tables",
    params(
        ("schema" = String, Path, description = "所属模式"),
        ("name" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "created 或 already_exists", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称不合法")
    )
)]
pub async fn ensure_table(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((schema, name)): Path<(String, String)>,
) -> ApiResult<ProvisionResult> {
    ensure_exists(&state, ResourceRef::table(schema, name), &[], &request_id).await
}

/// 确保表不存在（级联删除依赖对象）
#[utoipa::path(
    delete,
    path = "/api/schemas/{schema}/tables/{name}",
    tag = "tables",
    params(
        ("schema" = String, Path, description = "所属模式"),
        ("name" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "dropped 或 already_absent", body = ApiResponse<ProvisionResult>),
        (status = 400, description = "名称不合法")
    )
)]
pub async fn drop_table(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((schema, name)): Path<(String, String)>,
) -> ApiResult<ProvisionResult> {
    ensure_absent(&state, ResourceRef::table(schema, name), &request_id).await
}

/// 检查表是否存在
#[utoipa::path(
    get,
    path = "/api/schemas/{schema}/tables/{name}",
    tag = "tables",
    params(
        ("schema" = String, Path, description = "所属模式"),
        ("name" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "存在性", body = ApiResponse<ExistsResult>)
    )
)]
pub async fn table_exists(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((schema, name)): Path<(String, String)>,
) -> ApiResult<ExistsResult> {
    exists(&state, ResourceRef::table(schema, name), &request_id).await
}

/// 批量写入行
#[utoipa::path(
    post,
    path = "/api/schemas/{schema}/tables/{name}/rows",
    tag = "tables",
    params(
        ("schema" = String, Path, description = "所属模式"),
        ("name" = String, Path, description = "表名")
    ),
    request_body = LoadRowsRequest,
    responses(
        (status = 200, description = "写入行数", body = ApiResponse<LoadResult>),
        (status = 400, description = "列或行不合法")
    )
)]
pub async fn load_rows(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((schema, name)): Path<(String, String)>,
    Json(req): Json<LoadRowsRequest>,
) -> ApiResult<LoadResult> {
    let started = Instant::now();
    let req = validated(req)?;
    let resource = ResourceRef::table(schema, name);
    let rows = TableLoader::new(state.connector())
        .load_rows(&resource, &req.columns, &req.rows)
        .await?;
    Ok(respond(LoadResult { resource, rows }, &request_id, started))
}

/// 将 SELECT 结果写入新表
#[utoipa::path(
    post,
    path = "/api/schemas/{schema}/tables/{name}/from-query",
    tag = "tables",
    params(
        ("schema" = String, Path, description = "所属模式"),
        ("name" = String, Path, description = "表名")
    ),
    request_body = MaterializeRequest,
    responses(
        (status = 200, description = "写入行数", body = ApiResponse<LoadResult>),
        (status = 400, description = "SQL 不合法或表已存在")
    )
)]
pub async fn materialize_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((schema, name)): Path<(String, String)>,
    Json(req): Json<MaterializeRequest>,
) -> ApiResult<LoadResult> {
    let started = Instant::now();
    let req = validated(req)?;
    let resource = ResourceRef::table(schema, name);
    let rows = TableLoader::new(state.connector())
        .materialize_query(&resource, &req.sql)
        .await?;
    Ok(respond(LoadResult { resource, rows }, &request_id, started))
}

// ============== 用户 ==============

/// 列出 pg_catalog.pg_user
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "用户列表", body = ApiResponse<Vec<UserInfo>>)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Vec<UserInfo>> {
    let started = Instant::now();
    let data = Inspector::new(state.connector()).list_users().await?;
    Ok(respond(data, &request_id, started))
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
        target: format!(
            "{}:{}/{}",
            state.config.params.host,
            state.config.params.port,
            state.connector().database()
        ),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// 服务管理的目标，格式为 host:port/database
    pub target: String,
}
