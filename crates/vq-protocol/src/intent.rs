use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of intents the assistant can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Current state of a single machine.
    StatusQuery,
    /// A metric reading, optionally scoped to a machine and time range.
    MetricQuery,
    /// Top/bottom N machines by some metric.
    RankingQuery,
    /// Two or more machines side by side.
    ComparisonQuery,
    /// Plant-wide summary.
    OverviewQuery,
}

impl IntentKind {
    pub const ALL: [IntentKind; 5] = [
        IntentKind::StatusQuery,
        IntentKind::MetricQuery,
        IntentKind::RankingQuery,
        IntentKind::ComparisonQuery,
        IntentKind::OverviewQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::StatusQuery => "status_query",
            IntentKind::MetricQuery => "metric_query",
            IntentKind::RankingQuery => "ranking_query",
            IntentKind::ComparisonQuery => "comparison_query",
            IntentKind::OverviewQuery => "overview_query",
        }
    }

    /// Data-query intents hit the backing API with specific entities and
    /// carry a stricter confidence floor than low-stakes listings.
    pub fn is_data_query(&self) -> bool {
        matches!(
            self,
            IntentKind::StatusQuery | IntentKind::MetricQuery | IntentKind::ComparisonQuery
        )
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an intent or role name is outside the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for IntentKind {
    type Err = UnknownName;

    /// Accepts both `status_query` and `status-query` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        IntentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| UnknownName {
                kind: "intent",
                value: s.to_string(),
            })
    }
}

/// Slot an extracted value fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Machine,
    /// Second machine of a comparison.
    SecondMachine,
    Metric,
    TimeExpression,
    Limit,
}

impl EntityRole {
    pub const ALL: [EntityRole; 5] = [
        EntityRole::Machine,
        EntityRole::SecondMachine,
        EntityRole::Metric,
        EntityRole::TimeExpression,
        EntityRole::Limit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityRole::Machine => "machine",
            EntityRole::SecondMachine => "second_machine",
            EntityRole::Metric => "metric",
            EntityRole::TimeExpression => "time_expression",
            EntityRole::Limit => "limit",
        }
    }

    /// Roles whose values must resolve against the machine whitelist.
    pub fn is_machine(&self) -> bool {
        matches!(self, EntityRole::Machine | EntityRole::SecondMachine)
    }
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityRole {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        EntityRole::ALL
            .into_iter()
            .find(|r| r.as_str() == key)
            .ok_or_else(|| UnknownName {
                kind: "entity role",
                value: s.to_string(),
            })
    }
}

/// Which parsing tier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Tier 1: deterministic pattern rules.
    Pattern,
    /// Tier 2: keyword scoring against the catalog.
    Keyword,
    /// Tier 3: external semantic model.
    Semantic,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Pattern => "pattern",
            SourceTier::Keyword => "keyword",
            SourceTier::Semantic => "semantic",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier's proposal, passed unchanged to the validator.
///
/// `intent_name` stays a string so that a semantic-model guess naming an
/// intent outside the schema still reaches the validator's intent check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCandidate {
    intent_name: String,
    entities: BTreeMap<EntityRole, String>,
    confidence: f64,
    source_tier: SourceTier,
}

impl IntentCandidate {
    /// Build a candidate. Confidence is clamped to [0, 1]; NaN becomes 0.
    pub fn new(
        intent_name: impl Into<String>,
        entities: BTreeMap<EntityRole, String>,
        confidence: f64,
        source_tier: SourceTier,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            intent_name: intent_name.into(),
            entities,
            confidence,
            source_tier,
        }
    }

    pub fn intent_name(&self) -> &str {
        &self.intent_name
    }

    pub fn entities(&self) -> &BTreeMap<EntityRole, String> {
        &self.entities
    }

    pub fn entity(&self, role: EntityRole) -> Option<&str> {
        self.entities.get(&role).map(String::as_str)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source_tier(&self) -> SourceTier {
        self.source_tier
    }
}
