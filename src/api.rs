//! REST API Server for the COREP assessment assistant
//!
//! Exposes the pipeline over HTTP. Failures return a generic message plus a
//! diagnostic ID; the full error is only written to the log under that ID.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{PipelineError, Stage};
use crate::pipeline::AssessmentPipeline;

/// Minimum scenario length, in characters after trimming
pub const MIN_SCENARIO_CHARS: usize = 5;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScenarioRequest {
    pub scenario: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub stage: Stage,
    pub diagnostic_id: Uuid,
    pub timestamp: String,
}

impl ApiError {
    fn new(message: &str, stage: Stage, diagnostic_id: Uuid) -> Self {
        Self {
            error: message.to_string(),
            stage,
            diagnostic_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Pipeline error turned into a response, logged under its diagnostic ID.
///
/// For pipeline failures the diagnostic ID is the run's audit ID, so this log
/// line correlates with the pipeline's own failure log.
struct Failure {
    error: PipelineError,
    diagnostic_id: Uuid,
}

impl Failure {
    fn new(error: PipelineError, diagnostic_id: Uuid) -> Self {
        Self {
            error,
            diagnostic_id,
        }
    }

    fn invalid_request(message: String) -> Self {
        Self::new(PipelineError::InvalidRequest(message), Uuid::new_v4())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let err = self.error;
        let (status, message) = match &err {
            PipelineError::InvalidRequest(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Invalid scenario request.")
            }
            PipelineError::RetrievalFailure(_) => (
                StatusCode::BAD_GATEWAY,
                "Regulatory context retrieval failed.",
            ),
            PipelineError::ModelInvocationFailure(_) => {
                (StatusCode::BAD_GATEWAY, "The language model could not be reached.")
            }
            PipelineError::ModelTimeout { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                "The language model did not respond in time.",
            ),
            PipelineError::ModelOutputParseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The language model returned no usable structured output.",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."),
        };

        let body = ApiError::new(message, err.stage(), self.diagnostic_id);
        error!(
            diagnostic_id = %body.diagnostic_id,
            stage = ?body.stage,
            raw = err.raw_text().unwrap_or(""),
            "Request failed: {}",
            err
        );

        (status, Json(body)).into_response()
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<AssessmentPipeline>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.pipeline.provider(),
        "model": state.pipeline.model(),
    }))
}

/// =============================
/// Assessment Endpoints
/// =============================

async fn analyze_scenario(
    State(state): State<ApiState>,
    payload: Result<Json<ScenarioRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return Failure::invalid_request(format!("unreadable request body: {}", rejection))
                .into_response()
        }
    };

    // Length is checked on trimmed text; the scenario itself is kept verbatim
    if req.scenario.trim().chars().count() < MIN_SCENARIO_CHARS {
        return Failure::invalid_request(format!(
            "scenario must be at least {} characters",
            MIN_SCENARIO_CHARS
        ))
        .into_response();
    }

    info!(chars = req.scenario.len(), "Received scenario");

    let audit_id = Uuid::new_v4();
    match state.pipeline.run_with_id(&req.scenario, audit_id).await {
        Ok(assessment) => (StatusCode::OK, Json(assessment)).into_response(),
        Err(e) => Failure::new(e, audit_id).into_response(),
    }
}

async fn get_assessment(
    State(state): State<ApiState>,
    Path(audit_id): Path<Uuid>,
) -> Response {
    match state.pipeline.audit_log().get(audit_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "assessment not found" })),
        )
            .into_response(),
        Err(e) => Failure::new(e, Uuid::new_v4()).into_response(),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(pipeline: Arc<AssessmentPipeline>) -> Router {
    let state = ApiState { pipeline };

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze_scenario", post(analyze_scenario))
        .route("/api/assessments/:audit_id", get(get_assessment))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    pipeline: Arc<AssessmentPipeline>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
