//! Web 服务器模块
//!
//! 提供 `/analyzer` 前缀下的 HTTP API

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, State,
    },
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::application::analysis::NO_MESSAGES_REASON;
use crate::application::{AnalysisOutcome, AnalysisService};
use crate::core::collector::Collector;
use crate::core::store::Store;
use crate::domain::{snowflake_list, snowflake_str, AnalyzeRequest, HarvestJob, Snowflake};
use crate::errors::AnalyzerError;

const X_REASON: &str = "x-reason";

// ==================== 错误响应 ====================

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// 带状态码的 API 错误，响应体为 `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// 500，保留错误链
    pub fn internal(err: impl std::fmt::Display) -> Self {
        let detail = format!("{:#}", err);
        error!("request failed: {}", detail);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::ValidationError(detail) => Self::bad_request(detail),
            AnalyzerError::NotFound(detail) => Self::not_found(detail),
            other => Self::internal(other),
        }
    }
}

macro_rules! rejection_into_api_error {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::new(rejection.status(), rejection.body_text())
                }
            }
        )*
    };
}

rejection_into_api_error!(JsonRejection, QueryRejection, PathRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ==================== 提取器 ====================
// 提取失败时同样返回 `{"detail": "..."}`

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
struct ApiQuery<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
struct ApiPath<T>(T);

// ==================== 状态 ====================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub collector: Arc<dyn Collector>,
    pub analysis: AnalysisService,
}

// ==================== 请求类型 ====================

#[derive(Deserialize)]
pub struct HarvestRequest {
    /// 服务器管理员的 Discord 用户 ID（不是 Bot）
    #[serde(rename = "discordId")]
    pub discord_id: String,
    #[serde(rename = "serverId", with = "snowflake_str")]
    pub server_id: Snowflake,
    #[serde(with = "snowflake_list")]
    pub channels: Vec<Snowflake>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Deserialize)]
pub struct TrendQuery {
    #[serde(default)]
    pub trend_index: usize,
}

/// 校验文档 ID（UUID）
fn parse_doc_id(raw: &str, field: &str) -> ApiResult<String> {
    uuid::Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::bad_request(format!("Invalid {} format", field)))
}

// ==================== 处理器 ====================

/// 健康检查
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 新建采集任务
async fn queue_harvest(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<HarvestRequest>,
) -> ApiResult<Json<Value>> {
    let job = HarvestJob::new(req.discord_id, req.server_id, req.channels).with_bounds(req.after, req.before);
    let job_id = state.store.add_harvest_job(&job).await.map_err(ApiError::internal)?;

    info!(%job_id, server_id = job.server_id, channels = job.channels.len(), "harvest job queued");
    Ok(Json(json!({ "job_id": job_id, "status": "queued" })))
}

/// 服务器中 Bot 可读的文本频道，附带是否已采集
async fn list_channels(
    State(state): State<Arc<AppState>>,
    ApiPath(server_id): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let server_id: Snowflake = server_id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid server_id format"))?;

    let guild = state
        .collector
        .readable_text_channels(server_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("Guild {} not found or bot not a member.", server_id)))?;

    let ids: Vec<Snowflake> = guild.channels.iter().map(|c| c.id).collect();
    let harvested = state
        .store
        .harvested_channels(&ids)
        .await
        .map_err(ApiError::internal)?;

    let channels: Vec<Value> = guild
        .channels
        .iter()
        .map(|c| {
            json!({
                "id": c.id.to_string(),
                "name": c.name,
                "harvested": harvested.contains(&c.id),
            })
        })
        .collect();

    Ok(Json(json!({
        "server_id": guild.guild.id.to_string(),
        "server_name": guild.guild.name,
        "channels": channels,
    })))
}

/// 采集任务状态
async fn harvest_status(
    State(state): State<Arc<AppState>>,
    ApiPath(job_id): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let job_id = parse_doc_id(&job_id, "job_id")?;
    let job = state
        .store
        .get_harvest_job(&job_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(json!({
        "job_id": job.id,
        "status": job.status,
        "inserted": job.inserted,
        "finished_at": job.finished_at.map(|t| t.to_rfc3339()),
        "error": job.error,
    })))
}

/// Bot 所在服务器
async fn list_servers(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let servers: Vec<Value> = state
        .collector
        .servers()
        .await
        .map_err(ApiError::internal)?
        .into_iter()
        .map(|g| json!({ "id": g.id.to_string(), "name": g.name }))
        .collect();

    Ok(Json(json!({ "servers": servers })))
}

/// 频道分析；无消息时返回 204 和 `X-Reason`
async fn analyze(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> ApiResult<Response> {
    match state.analysis.analyze(&req).await? {
        AnalysisOutcome::NoMessages => Ok((
            StatusCode::NO_CONTENT,
            [(HeaderName::from_static(X_REASON), NO_MESSAGES_REASON)],
        )
            .into_response()),
        AnalysisOutcome::Completed(result) => Ok(Json(result).into_response()),
    }
}

/// 由分析结果中的趋势生成内容
async fn trend_to_content(
    State(state): State<Arc<AppState>>,
    ApiPath(analyse_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<TrendQuery>,
) -> ApiResult<Json<Value>> {
    let analyse_id = parse_doc_id(&analyse_id, "analyse_id")?;
    let result = state
        .analysis
        .trend_to_content(&analyse_id, query.trend_index)
        .await?;
    Ok(Json(result))
}

// ==================== 路由 ====================

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::very_permissive().expose_headers([HeaderName::from_static(X_REASON)]);

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/discord/harvest", post(queue_harvest))
        .route("/discord/channels/{server_id}", get(list_channels))
        .route("/discord/harvest/status/{job_id}", get(harvest_status))
        .route("/discord/servers", get(list_servers))
        .route("/discord/analyze", post(analyze))
        .route("/discord/trend-to-content/{analyse_id}", get(trend_to_content));

    Router::new()
        .nest("/analyzer", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// ==================== 服务器启动 ====================

pub async fn start_web_server<F>(bind_addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Web server started on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Web server stopped");
    Ok(())
}
