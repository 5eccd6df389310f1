//! Utterance resolution and resolution history.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;
use vq_resolver::{Outcome, Resolution};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Most entries returned by the history listing.
const LIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// Transcribed user utterance.
    pub utterance: String,
}

/// POST /api/v1/resolve
///
/// Both outcomes are a 200; the body says whether the command validated or
/// what to ask the user next.
pub async fn resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<Resolution>> {
    if req.utterance.trim().is_empty() {
        return Err(ApiError::BadRequest("utterance is empty".into()));
    }

    let resolution = state.resolver.resolve(&req.utterance).await;
    tracing::info!(
        resolution_id = %resolution.id,
        validated = resolution.outcome.is_validated(),
        latency_ms = resolution.latency_ms,
        "utterance resolved"
    );
    state.record(resolution.clone()).await;
    Ok(Json(resolution))
}

/// GET /api/v1/resolutions: newest first.
pub async fn list_resolutions(State(state): State<AppState>) -> Json<Vec<Value>> {
    let history = state.history.read().await;
    let recent = history
        .iter()
        .rev()
        .take(LIST_LIMIT)
        .map(|r| {
            let (status, detail) = match &r.outcome {
                Outcome::Validated(cmd) => ("validated", cmd.intent().as_str()),
                Outcome::Rejected(rej) => ("rejected", rej.kind.as_str()),
            };
            json!({
                "id": r.id,
                "utterance": r.utterance,
                "status": status,
                "detail": detail,
                "tier": r.tier,
                "resolved_at": r.resolved_at,
            })
        })
        .collect();
    Json(recent)
}

/// GET /api/v1/resolutions/{id}
pub async fn get_resolution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Resolution>> {
    let history = state.history.read().await;
    history
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("resolution '{id}' not found")))
}
