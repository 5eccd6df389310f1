//! Shared test harness for E2E scenario tests.
//!
//! Wires a real resolver, catalog, and router together with a scripted
//! inventory so tests can drive the HTTP surface and swap the plant's
//! machine list between requests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vq_api::routes::build_router;
use vq_api::state::AppState;
use vq_resolver::mock::ScriptedInventory;
use vq_resolver::{EntityCatalog, Inventory, Resolver, SemanticParser};

/// Machines on the sample plant floor.
pub const MACHINES: [&str; 6] = [
    "Compressor-1",
    "Compressor-2",
    "HVAC",
    "Boiler-1",
    "Main Pump",
    "Chiller-3",
];

pub const METRICS: [&str; 5] = ["power", "energy", "temperature", "pressure", "flow"];

pub fn sample_inventory() -> Inventory {
    Inventory::new(MACHINES, METRICS)
}

/// End-to-end harness: resolver + catalog + router over a scripted inventory.
pub struct TestHarness {
    pub state: AppState,
    pub router: Router,
    pub catalog: Arc<EntityCatalog>,
    /// What the next catalog refresh will pull.
    pub inventory: Arc<ScriptedInventory>,
}

impl TestHarness {
    /// Sample plant, no semantic tier.
    pub fn with_sample_data() -> Self {
        Self::build(None, Duration::from_secs(5))
    }

    /// Sample plant with a semantic backend and Tier 3 deadline.
    pub fn with_semantic(parser: Arc<dyn SemanticParser>, deadline: Duration) -> Self {
        Self::build(Some(parser), deadline)
    }

    fn build(parser: Option<Arc<dyn SemanticParser>>, deadline: Duration) -> Self {
        let catalog = Arc::new(EntityCatalog::new(sample_inventory()));
        let inventory = Arc::new(ScriptedInventory::new(sample_inventory()));

        let mut resolver = Resolver::new(catalog.clone()).with_semantic_timeout(deadline);
        if let Some(parser) = parser {
            resolver = resolver.with_semantic(parser);
        }

        let state = AppState::new(Arc::new(resolver), inventory.clone());
        let router = build_router(state.clone());
        Self {
            state,
            router,
            catalog,
            inventory,
        }
    }

    /// POST /api/v1/resolve. Returns (status, body).
    pub async fn resolve(&self, utterance: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "utterance": utterance });
        self.send(
            Request::post("/api/v1/resolve")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// POST /api/v1/catalog/refresh.
    pub async fn refresh_catalog(&self) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::post("/api/v1/catalog/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }
}

/// Assert a resolution body validated and return its outcome.
pub fn expect_validated(body: &serde_json::Value) -> &serde_json::Value {
    assert_eq!(
        body["outcome"]["status"], "validated",
        "expected validated outcome, got {body}"
    );
    &body["outcome"]
}

/// Assert a resolution body was rejected with `kind` and return its outcome.
pub fn expect_rejected<'a>(body: &'a serde_json::Value, kind: &str) -> &'a serde_json::Value {
    assert_eq!(
        body["outcome"]["status"], "rejected",
        "expected rejection, got {body}"
    );
    assert_eq!(body["outcome"]["kind"], kind, "wrong rejection kind: {body}");
    &body["outcome"]
}
