//! E2E scenarios for the Tier 3 fallback against a simulated Ollama server.

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{TestHarness, expect_rejected, expect_validated};
use vq_resolver::inference::semantic::{OllamaConfig, OllamaParser};

/// Ollama `/api/chat` reply wrapping the model's JSON answer.
fn chat_reply(content: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "phi3:mini",
        "message": { "role": "assistant", "content": content.to_string() },
        "done": true
    }))
}

fn harness_for(server: &MockServer, deadline: Duration) -> TestHarness {
    let parser = OllamaParser::new(OllamaConfig {
        host: server.uri(),
        ..OllamaConfig::default()
    })
    .unwrap();
    TestHarness::with_semantic(Arc::new(parser), deadline)
}

/// Off-script phrasing falls through both local tiers to the model.
#[tokio::test]
async fn e2e_semantic_fallback_validates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "format": "json", "stream": false })))
        .respond_with(chat_reply(json!({
            "intent": "status_query",
            "entities": { "machine": "boiler-1" },
            "confidence": 0.85
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_secs(5));
    let (_, body) = h.resolve("gimme the scoop on boiler-1").await;

    let outcome = expect_validated(&body);
    assert_eq!(outcome["intent"], "status_query");
    assert_eq!(outcome["source_tier"], "semantic");
    assert_eq!(outcome["entities"]["machine"]["value"], "Boiler-1");
    assert_eq!(body["tier"], "semantic");
    assert_eq!(
        body["tiers_attempted"],
        json!(["pattern", "keyword", "semantic"])
    );
}

/// The model may hallucinate a machine; the validator still refuses it.
#[tokio::test]
async fn e2e_semantic_hallucinated_machine_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply(json!({
            "intent": "status_query",
            "entities": { "machine": "Turbine-42" },
            "confidence": 0.9
        })))
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_secs(5));
    let (_, body) = h.resolve("what's up with the big spinny thing").await;

    let outcome = expect_rejected(&body, "unknown_entity");
    assert!(
        outcome["clarification_prompt"]
            .as_str()
            .unwrap()
            .contains("Turbine-42")
    );
    assert_eq!(body["tier"], "semantic");
}

/// Patterns answer without touching the model.
#[tokio::test]
async fn e2e_pattern_hit_skips_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply(json!({ "intent": null })))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_secs(5));
    let (_, body) = h.resolve("HVAC status").await;

    expect_validated(&body);
    assert_eq!(body["tier"], "pattern");
}

#[tokio::test]
async fn e2e_semantic_server_error_unresolved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_secs(5));
    let (status, body) = h.resolve("gimme the scoop on boiler-1").await;

    assert_eq!(status, axum::http::StatusCode::OK);
    expect_rejected(&body, "unresolved");
    assert!(body["tier"].is_null());
}

/// A model slower than the deadline never holds the request hostage.
#[tokio::test]
async fn e2e_semantic_timeout_unresolved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            chat_reply(json!({
                "intent": "status_query",
                "entities": { "machine": "boiler-1" },
                "confidence": 0.9
            }))
            .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_millis(200));
    let started = Instant::now();
    let (_, body) = h.resolve("gimme the scoop on boiler-1").await;

    assert!(started.elapsed() < Duration::from_secs(2));
    expect_rejected(&body, "unresolved");
}

/// A model answering outside the intent schema is not trusted.
#[tokio::test]
async fn e2e_semantic_unsupported_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply(json!({
            "intent": "weather_query",
            "entities": {},
            "confidence": 0.95
        })))
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_secs(5));
    let (_, body) = h.resolve("will it rain on the loading dock").await;

    expect_rejected(&body, "unsupported_intent");
}

/// Markdown-fenced model output is still understood.
#[tokio::test]
async fn e2e_semantic_fenced_output() {
    let server = MockServer::start().await;
    let fenced = "```json\n{\"intent\": \"overview_query\", \"entities\": {}, \"confidence\": 0.8}\n```";
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": fenced },
            "done": true
        })))
        .mount(&server)
        .await;

    let h = harness_for(&server, Duration::from_secs(5));
    let (_, body) = h.resolve("anything weird going on out there").await;

    let outcome = expect_validated(&body);
    assert_eq!(outcome["intent"], "overview_query");
}
