//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health: liveness check with the catalog version in use.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "catalog_version": state.catalog.snapshot().version(),
    }))
}
