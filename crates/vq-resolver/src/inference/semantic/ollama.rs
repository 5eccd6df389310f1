//! Ollama chat client for local semantic parsing.
//!
//! Calls `/api/chat` with JSON output forced. The pipeline wraps each call
//! in its own deadline; the client timeout here only bounds the socket.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{SemanticGuess, SemanticParser, decode_guess, system_prompt};
use crate::error::SemanticError;

/// Configuration for a local Ollama endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    /// Ollama HTTP API base URL.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "phi3:mini".into()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Only the fields we read.
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct OllamaParser {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaParser {
    pub fn new(config: OllamaConfig) -> Result<Self, SemanticError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SemanticError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SemanticParser for OllamaParser {
    async fn parse(&self, text: &str, schema: &str) -> Result<Option<SemanticGuess>, SemanticError> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let prompt = system_prompt(schema);

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            format: "json",
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SemanticError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SemanticError::Status(response.status().as_u16()));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SemanticError::Malformed(format!("ollama response body: {e}")))?;

        let Some(message) = chat.message else {
            return Ok(None);
        };
        decode_guess(&message.content)
    }

    fn backend_name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::semantic::schema_description;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Helper: build an Ollama chat response body.
    fn ollama_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "phi3:mini",
            "message": {
                "role": "assistant",
                "content": content
            },
            "done": true
        })
    }

    fn parser_for(server: &MockServer) -> OllamaParser {
        OllamaParser::new(OllamaConfig {
            host: server.uri(),
            model: "phi3:mini".into(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn parse_metric_query() {
        let server = MockServer::start().await;
        let body = ollama_response(
            r#"{"intent": "metric_query", "entities": {"machine": "Boiler-1", "metric": "temperature"}, "confidence": 0.8}"#,
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "phi3:mini",
                "format": "json",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let guess = parser_for(&server)
            .parse("how hot is boiler 1 running", &schema_description())
            .await
            .unwrap()
            .expect("should parse");
        assert_eq!(guess.intent.as_deref(), Some("metric_query"));
        assert_eq!(guess.entities["machine"], "Boiler-1");
    }

    #[tokio::test]
    async fn parse_no_intent() {
        let server = MockServer::start().await;
        let body = ollama_response(r#"{"intent": null, "entities": {}, "confidence": 0.0}"#);
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let result = parser_for(&server).parse("bake me a pizza", "").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn parse_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = parser_for(&server).parse("status", "").await.unwrap_err();
        assert!(matches!(err, SemanticError::Status(500)));
    }

    #[tokio::test]
    async fn parse_invalid_json() {
        let server = MockServer::start().await;
        let body = ollama_response("this is not json at all");
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let err = parser_for(&server).parse("status", "").await.unwrap_err();
        assert!(matches!(err, SemanticError::Malformed(_)));
    }

    #[tokio::test]
    async fn parse_unreachable() {
        let parser = OllamaParser::new(OllamaConfig {
            host: "http://127.0.0.1:1".into(),
            model: "phi3:mini".into(),
            timeout_secs: 1,
        })
        .unwrap();
        let err = parser.parse("status", "").await.unwrap_err();
        assert!(matches!(err, SemanticError::Transport(_)));
    }

    #[test]
    fn config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost:11434");
        assert_eq!(config.model, "phi3:mini");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
host = "http://192.168.1.50:11434"
model = "gemma:2b"
"#;
        let config: OllamaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "http://192.168.1.50:11434");
        assert_eq!(config.model, "gemma:2b");
        assert_eq!(config.timeout_secs, 10);
    }
}
