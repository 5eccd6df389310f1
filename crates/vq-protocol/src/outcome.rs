use serde::{Deserialize, Serialize};

use crate::time::TimeRange;

/// An entity value after validation, in its single authoritative spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CanonicalValue {
    /// Exact catalog machine name.
    Machine(String),
    /// Canonical metric token.
    Metric(String),
    TimeRange(TimeRange),
    Limit(u32),
}

impl CanonicalValue {
    /// Render the value back into the raw form a tier would have produced.
    ///
    /// Feeding this back through validation yields the same canonical value
    /// (time ranges re-resolve from their label).
    pub fn as_raw(&self) -> String {
        match self {
            CanonicalValue::Machine(name) => name.clone(),
            CanonicalValue::Metric(token) => token.clone(),
            CanonicalValue::TimeRange(range) => range.label().to_string(),
            CanonicalValue::Limit(n) => n.to_string(),
        }
    }

    pub fn as_machine(&self) -> Option<&str> {
        match self {
            CanonicalValue::Machine(name) => Some(name),
            _ => None,
        }
    }
}

/// Why a candidate was turned away. Mirrors the failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    UnsupportedIntent,
    LowConfidence,
    UnknownEntity,
    AmbiguousEntity,
    MissingEntity,
    InvalidTimeRange,
    InsufficientEntities,
    InvalidLimit,
    /// No tier produced an acceptable candidate.
    Unresolved,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::UnsupportedIntent => "unsupported_intent",
            RejectionKind::LowConfidence => "low_confidence",
            RejectionKind::UnknownEntity => "unknown_entity",
            RejectionKind::AmbiguousEntity => "ambiguous_entity",
            RejectionKind::MissingEntity => "missing_entity",
            RejectionKind::InvalidTimeRange => "invalid_time_range",
            RejectionKind::InsufficientEntities => "insufficient_entities",
            RejectionKind::InvalidLimit => "invalid_limit",
            RejectionKind::Unresolved => "unresolved",
        }
    }
}

/// Structured failure output for the clarification layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Classification of the first failing check.
    pub kind: RejectionKind,
    /// Every failing check, in evaluation order.
    pub reasons: Vec<String>,
    /// Catalog names offered as "did you mean" alternatives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// The single question to ask the user next.
    pub clarification_prompt: String,
}

impl Rejection {
    /// Generic "please rephrase" rejection for an utterance no tier could parse.
    pub fn unresolved() -> Self {
        Self {
            kind: RejectionKind::Unresolved,
            reasons: vec!["no parsing tier produced an acceptable candidate".into()],
            suggestions: Vec::new(),
            clarification_prompt: "Sorry, I didn't catch that. Could you rephrase your question?"
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn canonical_value_as_raw() {
        assert_eq!(CanonicalValue::Machine("HVAC-1".into()).as_raw(), "HVAC-1");
        assert_eq!(CanonicalValue::Limit(3).as_raw(), "3");

        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, end, "yesterday").unwrap();
        assert_eq!(CanonicalValue::TimeRange(range).as_raw(), "yesterday");
    }

    #[test]
    fn canonical_value_is_tagged() {
        let json = serde_json::to_value(CanonicalValue::Metric("power".into())).unwrap();
        assert_eq!(json["type"], "metric");
        assert_eq!(json["value"], "power");
    }

    #[test]
    fn rejection_kind_names_match_serde() {
        for kind in [
            RejectionKind::UnknownEntity,
            RejectionKind::InvalidTimeRange,
            RejectionKind::Unresolved,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn unresolved_rejection_shape() {
        let r = Rejection::unresolved();
        assert_eq!(r.kind, RejectionKind::Unresolved);
        assert!(r.suggestions.is_empty());
        assert!(r.clarification_prompt.contains("rephrase"));

        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""kind":"unresolved""#));
        assert!(!json.contains("suggestions")); // skipped when empty
    }
}
