use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use benefit_flow::{
    BenefitCatalog, BenefitsError, BenefitsRunner, EmbeddedBenefitCatalog, FileBenefitCatalog,
    GeminiGateway, InMemorySessionStorage,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{ClassifyRequest, SelectBenefitRequest, SessionResponse},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn api_error(e: BenefitsError) -> ApiError {
    match &e {
        BenefitsError::SessionNotFound(id) => not_found_error("Session not found", id),
        BenefitsError::BenefitNotFound(id) => not_found_error("Benefit not found", id),
        // Orchestration errors travel inside the session snapshot instead
        BenefitsError::UpstreamUnavailable(_)
        | BenefitsError::InvalidClassification(_)
        | BenefitsError::CatalogUnavailable(_)
        | BenefitsError::NoSelection
        | BenefitsError::EmptyInput
        | BenefitsError::Configuration(_) => {
            error!(error = %e, "Request failed");
            internal_error("Request failed", &e.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: BenefitsRunner,
}

impl AppState {
    pub fn new(runner: BenefitsRunner) -> Self {
        Self { runner }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, BenefitsError> {
        let gateway = Arc::new(GeminiGateway::new(config.gemini.clone())?);
        let catalog: Arc<dyn BenefitCatalog> = match &config.catalog_path {
            Some(path) => {
                info!(path = %path.display(), "Using benefits catalog file");
                Arc::new(FileBenefitCatalog::new(path))
            }
            None => {
                info!("Using embedded benefits catalog (set BENEFITS_CATALOG_PATH to override)");
                Arc::new(EmbeddedBenefitCatalog)
            }
        };
        let storage = Arc::new(InMemorySessionStorage::new());

        Ok(Self::new(BenefitsRunner::new(gateway, catalog, storage)))
    }
}

pub fn create_app(config: &ServiceConfig) -> Result<Router, BenefitsError> {
    Ok(build_router(AppState::from_config(config)?))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/classify", post(classify))
        .route("/sessions/{id}/select", post(select_benefit))
        .route("/sessions/{id}/plan", post(generate_plan))
        .route("/sessions/{id}/reset", post(reset))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(from_fn(correlation_id_middleware)),
        )
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Health Benefits Assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Matches a described health concern to benefits and drafts an action plan",
        "endpoints": {
            "POST /sessions": "Start a new session",
            "GET /sessions/{id}": "Current session state",
            "POST /sessions/{id}/classify": "Classify a health concern and list matching benefits",
            "POST /sessions/{id}/select": "Select one of the matched benefits",
            "POST /sessions/{id}/plan": "Generate an action plan for the selected benefit",
            "POST /sessions/{id}/reset": "Clear the matched benefits",
            "DELETE /sessions/{id}": "End a session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let session = state.runner.start_session().await.map_err(api_error)?;
    let snapshot = session.snapshot().await;
    Ok(Json(SessionResponse::from_state(session.id(), snapshot)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let snapshot = state.runner.snapshot(&session_id).await.map_err(api_error)?;
    Ok(Json(SessionResponse::from_state(session_id, snapshot)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .runner
        .end_session(&session_id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn classify(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<SessionResponse> {
    info!(
        session_id = %session_id,
        content_length = request.text.len(),
        "Processing classify request"
    );

    let snapshot = state
        .runner
        .classify(&session_id, &request.text)
        .await
        .map_err(api_error)?;
    if let Some(message) = &snapshot.last_error {
        warn!(session_id = %session_id, error = %message, "Classification ended with an error");
    }
    Ok(Json(SessionResponse::from_state(session_id, snapshot)))
}

async fn select_benefit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectBenefitRequest>,
) -> ApiResult<SessionResponse> {
    let snapshot = state
        .runner
        .select_benefit_by_id(&session_id, &request.benefit_id)
        .await
        .map_err(api_error)?;
    Ok(Json(SessionResponse::from_state(session_id, snapshot)))
}

async fn generate_plan(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    info!(session_id = %session_id, "Processing plan request");

    let snapshot = state
        .runner
        .generate_selected_plan(&session_id)
        .await
        .map_err(api_error)?;
    Ok(Json(SessionResponse::from_state(session_id, snapshot)))
}

async fn reset(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let snapshot = state.runner.reset(&session_id).await.map_err(api_error)?;
    Ok(Json(SessionResponse::from_state(session_id, snapshot)))
}
