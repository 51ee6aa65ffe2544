//! Long-running HTTP service for the FinSight site.
//!
//! One process owns the sled database and serves every front end, so the
//! exclusive file lock is never contended.
//!
//! # Endpoints
//!
//! - `GET /health` - readiness of the local store
//! - `POST /api/ask` - ask the concierge
//! - `GET|POST /api/contexts`, `GET|PUT|DELETE /api/contexts/:id` - knowledge base
//! - `GET|POST /api/tools`, `GET|PUT|DELETE /api/tools/:id`, `GET /api/tools/compare?ids=a,b`
//! - `GET|POST /api/insights`, `GET|PUT|DELETE /api/insights/:id`
//! - `GET|POST /api/agents`, `GET|PUT|DELETE /api/agents/:id`
//! - `POST /api/generate/article`, `/api/generate/tool-details`, `/api/generate/related-insights`
//!
//! # Environment Variables
//!
//! - `FINSIGHT_LOG`: logging level (trace, debug, info, warn, error)
//! - `FINSIGHT_DATA_DIR`: override data directory location
//! - `FINSIGHT_SERVICE_HOST`: bind address (default: 127.0.0.1)
//! - `FINSIGHT_SERVICE_PORT`: port (default: 3300)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use finsight_lib::application::dtos::{
    AgentListResponse, ContextListResponse, InsightListResponse, SuggestInsightsResponse,
    ToolComparison, ToolListResponse,
};
use finsight_lib::application::{
    AgentRequest, ArticleDraft, AskRequest, AskResponse, DraftArticleRequest, ExtractToolRequest,
    HealthStatusResponse, InsightRequest, SuggestInsightsRequest, ToolRequest,
    UpsertContextRequest,
};
use finsight_lib::domain::{Agent, ContextEntry, DomainError, Insight, Tool, ToolDetails};
use finsight_lib::{build_environment, init_tracing, AppHandles};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3300;

#[derive(Clone)]
struct AppState {
    handles: Arc<AppHandles>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.to_string(),
            },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let (status, code) = match &err {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            DomainError::LimitExceeded(_) => (StatusCode::BAD_REQUEST, "LIMIT_EXCEEDED"),
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            DomainError::Model(_) => (StatusCode::BAD_GATEWAY, "MODEL_FAILURE"),
            DomainError::InvalidModelOutput(_) => (StatusCode::BAD_GATEWAY, "INVALID_MODEL_OUTPUT"),
            DomainError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION"),
            DomainError::StoreUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_UNAVAILABLE")
            }
            DomainError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE"),
            DomainError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        if status.is_server_error() {
            error!(target: "finsight::http", code, error = %err, "request failed");
        } else {
            warn!(target: "finsight::http", code, error = %err, "request rejected");
        }
        ApiError::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a blocking service call off the async runtime.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| DomainError::other(format!("worker task failed: {err}")))?
        .map_err(ApiError::from)
}

// ============================================================================
// Health and concierge
// ============================================================================

async fn health_check(State(state): State<AppState>) -> ApiResult<HealthStatusResponse> {
    let handles = Arc::clone(&state.handles);
    run_blocking(move || handles.health()).await.map(Json)
}

async fn ask(
    State(state): State<AppState>,
    Json(payload): Json<AskRequest>,
) -> ApiResult<AskResponse> {
    validate_query(&payload)?;

    let concierge = Arc::clone(&state.handles.concierge);
    let response = run_blocking(move || Ok(concierge.respond(&payload.query))).await?;
    Ok(Json(response))
}

/// Blank questions are rejected here; the pipeline itself would answer them.
fn validate_query(request: &AskRequest) -> Result<(), ApiError> {
    if request.query.trim().is_empty() {
        return Err(DomainError::validation("query is required").into());
    }
    Ok(())
}

// ============================================================================
// Knowledge base
// ============================================================================

async fn list_contexts(State(state): State<AppState>) -> ApiResult<ContextListResponse> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.list_contexts()).await.map(Json)
}

async fn get_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ContextEntry> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.get_context(&id)).await.map(Json)
}

async fn create_context(
    State(state): State<AppState>,
    Json(payload): Json<UpsertContextRequest>,
) -> Result<(StatusCode, Json<ContextEntry>), ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    let entry = run_blocking(move || catalog.upsert_context(payload)).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut payload): Json<UpsertContextRequest>,
) -> ApiResult<ContextEntry> {
    payload.id = Some(id);
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.upsert_context(payload))
        .await
        .map(Json)
}

async fn delete_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.delete_context(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Tools
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompareParams {
    ids: String,
}

async fn list_tools(State(state): State<AppState>) -> ApiResult<ToolListResponse> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.list_tools()).await.map(Json)
}

async fn get_tool(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Tool> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.get_tool(id)).await.map(Json)
}

async fn create_tool(
    State(state): State<AppState>,
    Json(payload): Json<ToolRequest>,
) -> Result<(StatusCode, Json<Tool>), ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    let tool = run_blocking(move || catalog.create_tool(payload)).await?;
    Ok((StatusCode::CREATED, Json(tool)))
}

async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToolRequest>,
) -> ApiResult<Tool> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.update_tool(id, payload))
        .await
        .map(Json)
}

async fn delete_tool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.delete_tool(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn compare_tools(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> ApiResult<ToolComparison> {
    let ids = parse_id_list(&params.ids)?;
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.compare_tools(&ids))
        .await
        .map(Json)
}

fn parse_id_list(raw: &str) -> Result<Vec<Uuid>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            Uuid::parse_str(part)
                .map_err(|_| DomainError::validation(format!("invalid tool id `{part}`")).into())
        })
        .collect()
}

// ============================================================================
// Insights
// ============================================================================

async fn list_insights(State(state): State<AppState>) -> ApiResult<InsightListResponse> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.list_insights()).await.map(Json)
}

async fn get_insight(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Insight> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.get_insight(id)).await.map(Json)
}

async fn create_insight(
    State(state): State<AppState>,
    Json(payload): Json<InsightRequest>,
) -> Result<(StatusCode, Json<Insight>), ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    let insight = run_blocking(move || catalog.create_insight(payload)).await?;
    Ok((StatusCode::CREATED, Json(insight)))
}

async fn update_insight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InsightRequest>,
) -> ApiResult<Insight> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.update_insight(id, payload))
        .await
        .map(Json)
}

async fn delete_insight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.delete_insight(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Agents
// ============================================================================

async fn list_agents(State(state): State<AppState>) -> ApiResult<AgentListResponse> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.list_agents()).await.map(Json)
}

async fn get_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Agent> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.get_agent(id)).await.map(Json)
}

async fn create_agent(
    State(state): State<AppState>,
    Json(payload): Json<AgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    let agent = run_blocking(move || catalog.create_agent(payload)).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AgentRequest>,
) -> ApiResult<Agent> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.update_agent(id, payload))
        .await
        .map(Json)
}

async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let catalog = Arc::clone(&state.handles.catalog);
    run_blocking(move || catalog.delete_agent(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Content generation
// ============================================================================

async fn draft_article(
    State(state): State<AppState>,
    Json(payload): Json<DraftArticleRequest>,
) -> ApiResult<ArticleDraft> {
    let content = Arc::clone(&state.handles.content);
    run_blocking(move || content.draft_article(payload))
        .await
        .map(Json)
}

async fn extract_tool_details(
    State(state): State<AppState>,
    Json(payload): Json<ExtractToolRequest>,
) -> ApiResult<ToolDetails> {
    let content = Arc::clone(&state.handles.content);
    run_blocking(move || content.extract_tool_details(payload))
        .await
        .map(Json)
}

async fn suggest_related_insights(
    State(state): State<AppState>,
    Json(payload): Json<SuggestInsightsRequest>,
) -> ApiResult<SuggestInsightsResponse> {
    let content = Arc::clone(&state.handles.content);
    run_blocking(move || content.suggest_related_insights(payload))
        .await
        .map(Json)
}

// ============================================================================
// Service setup and main
// ============================================================================

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/ask", post(ask))
        .route("/api/contexts", get(list_contexts).post(create_context))
        .route(
            "/api/contexts/:id",
            get(get_context).put(update_context).delete(delete_context),
        )
        .route("/api/tools", get(list_tools).post(create_tool))
        .route("/api/tools/compare", get(compare_tools))
        .route(
            "/api/tools/:id",
            get(get_tool).put(update_tool).delete(delete_tool),
        )
        .route("/api/insights", get(list_insights).post(create_insight))
        .route(
            "/api/insights/:id",
            get(get_insight).put(update_insight).delete(delete_insight),
        )
        .route("/api/agents", get(list_agents).post(create_agent))
        .route(
            "/api/agents/:id",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
        .route("/api/generate/article", post(draft_article))
        .route("/api/generate/tool-details", post(extract_tool_details))
        .route(
            "/api/generate/related-insights",
            post(suggest_related_insights),
        )
        .with_state(state)
}

fn bind_address() -> anyhow::Result<SocketAddr> {
    let host = std::env::var("FINSIGHT_SERVICE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = std::env::var("FINSIGHT_SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "finsight::http", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target: "finsight::http", "shutdown requested");
}

async fn run_service() -> anyhow::Result<()> {
    init_tracing();
    info!(
        target: "finsight::http",
        "starting FinSight service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let handles = tokio::task::spawn_blocking(build_environment)
        .await
        .context("initialization task panicked")?
        .context("failed to initialize application")?;

    info!(target: "finsight::http", data_dir = %handles.data_dir.display(), "application initialized");

    let app = router(AppState {
        handles: Arc::new(handles),
    });

    let addr = bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(target: "finsight::http", "listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_service().await {
        eprintln!("[finsight::service] service failed: {err:?}");
        std::process::exit(1);
    }
}
