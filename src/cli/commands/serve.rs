//! HTTP API server for upload and query clients.
//!
//! Every request except `/health` is scoped to the tenant named in the
//! `x-tenant-id` header.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::PinpointError;
use crate::jobs::{JobRecord, Notification};
use crate::orchestrator::{Orchestrator, VideoAsset};
use crate::rag::{Answer, QueryPipeline};
use crate::retrieval::Candidate;
use crate::services::Services;
use crate::tenant::TenantId;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use uuid::Uuid;

/// Header carrying the tenant identity.
pub const TENANT_HEADER: &str = "x-tenant-id";

const MAX_UPLOAD_BYTES: usize = 1 << 30;

/// Shared application state.
struct AppState {
    services: Arc<Services>,
    orchestrator: Orchestrator,
    pipeline: QueryPipeline,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let services = Arc::new(Services::new(settings)?);
    let app = router(services).await?;

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Pinpoint API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints (tenant from the {} header):", TENANT_HEADER);
    Output::kv("Health", "GET    /health");
    Output::kv("Upload", "PUT    /videos/{name}");
    Output::kv("List videos", "GET    /videos");
    Output::kv("Delete", "DELETE /videos/{name}");
    Output::kv("Rename", "POST   /videos/{name}/rename");
    Output::kv("Cancel", "POST   /videos/{name}/cancel");
    Output::kv("Search video", "POST   /videos/{name}/search");
    Output::kv("Jobs", "GET    /jobs");
    Output::kv("Notifications", "POST   /notifications/drain");
    Output::kv("Search", "POST   /search");
    Output::kv("Ask", "POST   /ask");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router over `services`.
pub async fn router(services: Arc<Services>) -> crate::Result<Router> {
    let pipeline = QueryPipeline::from_services(&services).await?;
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(services.clone()),
        services,
        pipeline,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(health))
        .route("/videos", get(list_videos))
        .route("/videos/{name}", put(upload).delete(delete_video))
        .route("/videos/{name}/rename", post(rename_video))
        .route("/videos/{name}/cancel", post(cancel))
        .route("/videos/{name}/search", post(search_video))
        .route("/jobs", get(list_jobs))
        .route("/notifications/drain", post(drain_notifications))
        .route("/search", post(search))
        .route("/ask", post(ask))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state))
}

// === Tenant extraction and errors ===

/// The requesting tenant, from the `x-tenant-id` header.
struct Tenant(TenantId);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PinpointError::TenantUnresolvable(format!("missing {} header", TENANT_HEADER))
            })?;
        Ok(Tenant(TenantId::new(value)?))
    }
}

/// A library error rendered as a JSON body with a matching status code.
struct ApiError(PinpointError);

impl From<PinpointError> for ApiError {
    fn from(e: PinpointError) -> Self {
        Self(e)
    }
}

fn status_for(error: &PinpointError) -> StatusCode {
    match error {
        PinpointError::VideoNotFound(_) | PinpointError::CollectionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        PinpointError::JobAlreadyActive(_) => StatusCode::CONFLICT,
        PinpointError::InvalidInput(_) | PinpointError::TenantUnresolvable(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// === Request/Response Types ===

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize, Deserialize)]
struct UploadResponse {
    video_id: String,
    job_id: Uuid,
}

#[derive(Deserialize)]
struct RenameRequest {
    new_name: String,
}

#[derive(Serialize)]
struct CancelResponse {
    cancelled: bool,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

#[derive(Deserialize)]
struct VideoSearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<Candidate>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct VideoListResponse {
    videos: Vec<VideoAsset>,
    total: usize,
}

#[derive(Serialize)]
struct JobListResponse {
    jobs: Vec<JobRecord>,
}

#[derive(Serialize)]
struct NotificationResponse {
    notifications: Vec<Notification>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if body.is_empty() {
        return Err(PinpointError::InvalidInput("empty upload".to_string()).into());
    }
    let handle = state.orchestrator.upload(&tenant, &name, &body).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            video_id: handle.video_id.clone(),
            job_id: handle.job_id,
        }),
    ))
}

async fn list_videos(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
) -> ApiResult<Json<VideoListResponse>> {
    let videos = state.orchestrator.list_videos(&tenant).await?;
    Ok(Json(VideoListResponse {
        total: videos.len(),
        videos,
    }))
}

async fn delete_video(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.delete_video(&tenant, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rename_video(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<StatusCode> {
    state
        .orchestrator
        .rename_video(&tenant, &name, &req.new_name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let cancelled = state.orchestrator.cancel(&tenant, &name).await?;
    Ok(Json(CancelResponse { cancelled }))
}

async fn search_video(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Path(name): Path<String>,
    Json(req): Json<VideoSearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let results = state
        .pipeline
        .search_video(&tenant, &name, &req.query, req.limit)
        .await?;
    Ok(Json(SearchResponse { results }))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
) -> ApiResult<Json<JobListResponse>> {
    let jobs = state.services.jobs().list_active(&tenant).await?;
    Ok(Json(JobListResponse { jobs }))
}

async fn drain_notifications(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
) -> ApiResult<Json<NotificationResponse>> {
    let notifications = state.services.jobs().drain_notifications(&tenant).await?;
    Ok(Json(NotificationResponse { notifications }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let results = state.pipeline.search(&tenant, &req.query).await?;
    Ok(Json(SearchResponse { results }))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Tenant(tenant): Tenant,
    Json(req): Json<AskRequest>,
) -> ApiResult<Json<Answer>> {
    Ok(Json(state.pipeline.ask(&tenant, &req.question).await?))
}
