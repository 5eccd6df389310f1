//! Tier 3: semantic model boundary.
//!
//! The model itself is an external collaborator. This module defines what
//! the pipeline asks of it, the prompt describing the schema, and the
//! conversion from whatever the model emits into an `IntentCandidate`.
//! Anything malformed stops here as an error or `None`.

pub mod bedrock;
pub mod ollama;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use serde::Deserialize;
use vq_protocol::{EntityRole, IntentCandidate, IntentKind, SourceTier};

use crate::error::SemanticError;

pub use bedrock::{BedrockConfig, BedrockParser};
pub use ollama::{OllamaConfig, OllamaParser};

/// External parser that turns free text into a best-effort guess.
#[async_trait]
pub trait SemanticParser: Send + Sync {
    /// Parse `text` given a compact `schema` description.
    /// `Ok(None)` means the model declined to pick an intent.
    async fn parse(&self, text: &str, schema: &str) -> Result<Option<SemanticGuess>, SemanticError>;

    /// Name of this backend (for logging).
    fn backend_name(&self) -> &str;
}

/// Raw model output before it becomes a candidate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SemanticGuess {
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub confidence: f64,
}

impl SemanticGuess {
    pub fn new(intent: impl Into<String>, confidence: f64) -> Self {
        Self {
            intent: Some(intent.into()),
            entities: BTreeMap::new(),
            confidence,
        }
    }

    pub fn with_entity(mut self, role: &str, value: impl Into<serde_json::Value>) -> Self {
        self.entities.insert(role.to_string(), value.into());
        self
    }

    /// Convert into a candidate. Unknown roles and non-scalar values are
    /// dropped; a missing or empty intent yields `None`. The intent name is
    /// kept verbatim so the validator can reject names outside the schema.
    pub fn into_candidate(self) -> Option<IntentCandidate> {
        let intent = self.intent?.trim().to_string();
        if intent.is_empty() {
            return None;
        }

        let mut entities = BTreeMap::new();
        for (key, value) in self.entities {
            let Ok(role) = key.parse::<EntityRole>() else {
                tracing::warn!(role = %key, "semantic model returned unknown entity role");
                continue;
            };
            let value = match value {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !value.is_empty() {
                entities.insert(role, value);
            }
        }

        Some(IntentCandidate::new(
            intent,
            entities,
            self.confidence,
            SourceTier::Semantic,
        ))
    }
}

/// Compact description of the intents and entity roles, embedded in prompts.
pub fn schema_description() -> String {
    let mut out = String::from("Intents:\n");
    for intent in IntentKind::ALL {
        let _ = writeln!(out, "- {}: {}", intent.as_str(), intent_hint(intent));
    }
    out.push_str("Entity roles:\n");
    for role in EntityRole::ALL {
        let _ = writeln!(out, "- {}: {}", role.as_str(), role_hint(role));
    }
    out
}

fn intent_hint(intent: IntentKind) -> &'static str {
    match intent {
        IntentKind::StatusQuery => "current state of one machine (needs machine)",
        IntentKind::MetricQuery => "a metric reading, optionally for a machine and time range",
        IntentKind::RankingQuery => "top N machines by a metric",
        IntentKind::ComparisonQuery => "two machines side by side (needs machine and second_machine)",
        IntentKind::OverviewQuery => "plant-wide summary",
    }
}

fn role_hint(role: EntityRole) -> &'static str {
    match role {
        EntityRole::Machine => "machine name exactly as the user said it",
        EntityRole::SecondMachine => "second machine name for comparisons",
        EntityRole::Metric => "metric such as power, energy, temperature",
        EntityRole::TimeExpression => "time phrase such as today, yesterday, last 24 hours",
        EntityRole::Limit => "integer count for rankings",
    }
}

/// System prompt shared by every backend.
pub fn system_prompt(schema: &str) -> String {
    format!(
        r#"You are an intent parser for an industrial monitoring voice assistant. Map the user's question onto the schema below.

{schema}
Respond with ONLY a JSON object (no markdown, no explanation):
{{"intent": "<intent>", "entities": {{"<role>": "<value>"}}, "confidence": <0.0-1.0>}}

Copy entity values verbatim from the question; never invent machine names.
If the question does not fit any intent, respond with:
{{"intent": null, "entities": {{}}, "confidence": 0.0}}"#
    )
}

/// Extract JSON from model output that may be wrapped in markdown fences.
pub(crate) fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Try ```json ... ``` first
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Try ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Assume raw JSON
    trimmed
}

/// Decode model text into a guess. A null intent is `Ok(None)`.
pub(crate) fn decode_guess(raw: &str) -> Result<Option<SemanticGuess>, SemanticError> {
    let guess: SemanticGuess = serde_json::from_str(extract_json(raw))
        .map_err(|e| SemanticError::Malformed(format!("{e}: {raw}")))?;
    if guess.intent.is_none() {
        return Ok(None);
    }
    Ok(Some(guess))
}
