//! API route definitions and router builder.

pub mod catalog;
pub mod health;
pub mod resolve;

use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/resolve", post(resolve::resolve))
        .route("/resolutions", get(resolve::list_resolutions))
        .route("/resolutions/{id}", get(resolve::get_resolution))
        .route("/catalog", get(catalog::get_catalog))
        .route("/catalog/refresh", post(catalog::refresh_catalog));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use vq_resolver::mock::FailingInventory;

    fn app() -> Router {
        build_router(AppState::with_sample_data())
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn resolve_request(utterance: &str) -> Request<Body> {
        let body = serde_json::json!({ "utterance": utterance });
        Request::post("/api/v1/resolve")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["catalog_version"], 1);
    }

    #[tokio::test]
    async fn resolve_validated() {
        let response = app().oneshot(resolve_request("top 3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["outcome"]["status"], "validated");
        assert_eq!(json["outcome"]["intent"], "ranking_query");
        assert_eq!(json["tier"], "pattern");
        assert!(json["id"].is_string());
    }

    #[tokio::test]
    async fn resolve_rejected_is_still_ok() {
        let response = app()
            .oneshot(resolve_request("Machine-99 status"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["outcome"]["status"], "rejected");
        assert_eq!(json["outcome"]["kind"], "unknown_entity");
        assert!(
            json["outcome"]["clarification_prompt"]
                .as_str()
                .unwrap()
                .contains("Machine-99")
        );
    }

    #[tokio::test]
    async fn resolve_empty_utterance() {
        let response = app().oneshot(resolve_request("  ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn resolutions_are_listed_newest_first() {
        let state = AppState::with_sample_data();
        let app = build_router(state.clone());

        for utterance in ["top 3", "HVAC status"] {
            let response = app.clone().oneshot(resolve_request(utterance)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/resolutions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["utterance"], "HVAC status");
        assert_eq!(list[0]["detail"], "status_query");

        let id = list[1]["id"].as_str().unwrap();
        let response = app
            .oneshot(
                Request::get(format!("/api/v1/resolutions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["utterance"], "top 3");
    }

    #[tokio::test]
    async fn unknown_resolution_not_found() {
        let response = app()
            .oneshot(
                Request::get(format!("/api/v1/resolutions/{}", uuid::Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn catalog_lists_names() {
        let response = app()
            .oneshot(Request::get("/api/v1/catalog").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["version"], 1);
        assert_eq!(json["entities"].as_array().unwrap().len(), 5);
        assert!(json["metrics"].as_array().unwrap().contains(&"power".into()));
    }

    #[tokio::test]
    async fn catalog_refresh_bumps_version() {
        let response = app()
            .oneshot(
                Request::post("/api/v1/catalog/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["version"], 2);
    }

    #[tokio::test]
    async fn catalog_refresh_failure_keeps_stale() {
        let sample = AppState::with_sample_data();
        let state = AppState::new(sample.resolver.clone(), Arc::new(FailingInventory));
        let app = build_router(state.clone());

        let response = app
            .oneshot(
                Request::post("/api/v1/catalog/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(state.catalog.snapshot().version(), 1);
        assert_eq!(state.catalog.snapshot().entities().len(), 5);
    }
}
