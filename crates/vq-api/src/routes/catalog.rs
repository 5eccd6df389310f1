//! Entity catalog inspection and on-demand refresh.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CatalogView {
    pub version: u64,
    pub refreshed_at: DateTime<Utc>,
    pub entities: Vec<String>,
    pub metrics: Vec<String>,
}

/// GET /api/v1/catalog
pub async fn get_catalog(State(state): State<AppState>) -> Json<CatalogView> {
    let snapshot = state.catalog.snapshot();
    Json(CatalogView {
        version: snapshot.version(),
        refreshed_at: snapshot.refreshed_at(),
        entities: snapshot.entities().canonical_names().map(String::from).collect(),
        metrics: snapshot.metrics().canonical_names().map(String::from).collect(),
    })
}

/// POST /api/v1/catalog/refresh
///
/// A failing source leaves the stale catalog serving and answers 502.
pub async fn refresh_catalog(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let version = state
        .catalog
        .refresh(state.inventory.as_ref())
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(json!({ "version": version })))
}
