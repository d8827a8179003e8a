//! Axum route handlers for the chess-explainer HTTP server.
//!
//! # Routes
//!
//! - `GET  /health` : Returns `{"status": "ok", "version": ...}`
//! - `POST /explain`: Accepts an explanation request, returns the grounded result

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::explain::{ExplanationAgent, ExplanationRequest, ExplanationResult, MoveClassification};
use crate::position::Position;
use crate::utilities::errors::ExplainError;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ExplanationAgent>,
}

impl AppState {
    pub fn new(agent: ExplanationAgent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }
}

/// Body of `POST /explain`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainBody {
    pub fen: String,
    pub played_move: String,
    #[serde(default)]
    pub best_move: Option<String>,
    /// When absent, derived from `evaluation_delta`.
    #[serde(default)]
    pub classification: Option<MoveClassification>,
    #[serde(default)]
    pub evaluation_delta: Option<i32>,
    #[serde(default)]
    pub principal_variation: Vec<String>,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

impl ExplainBody {
    fn into_request(self) -> Result<ExplanationRequest, ApiError> {
        let position = Position::from_fen(&self.fen)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
        let classification = match (self.classification, self.evaluation_delta) {
            (Some(classification), _) => classification,
            (None, Some(delta)) => MoveClassification::from_cp_loss(-delta),
            (None, None) => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "Either 'classification' or 'evaluation_delta' is required",
                ))
            }
        };

        let mut request = ExplanationRequest::new(position, self.played_move, classification)
            .with_principal_variation(self.principal_variation);
        if let Some(best) = self.best_move {
            request = request.with_best_move(best);
        }
        if let Some(delta) = self.evaluation_delta {
            request = request.with_evaluation_delta(delta);
        }
        Ok(request)
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/explain", post(explain_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health, liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "chess-explainer",
    }))
}

/// POST /explain, explain one move.
///
/// 400 for an unusable request, 502 when the model cannot produce the
/// explanation.
async fn explain_handler(
    State(state): State<AppState>,
    Json(body): Json<ExplainBody>,
) -> Result<Json<ExplanationResult>, ApiError> {
    let request = body.into_request()?;
    match state.agent.explain(&request).await {
        Ok(result) => Ok(Json(result)),
        Err(e @ ExplainError::Generation { .. }) => {
            tracing::warn!("Explanation failed: {}", e);
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
        Err(e) => {
            tracing::error!("Explanation pipeline error: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
