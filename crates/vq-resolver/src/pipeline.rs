//! Confidence arbiter: runs the tiers in order and hands the first
//! acceptable candidate to the validator.
//!
//! ```text
//! AttemptTier1 ──hit──────────────────────────────┐
//!      │ miss                                      │
//! AttemptTier2 ──score ≥ keyword floor────────────┤
//!      │ miss / below floor                        ▼
//! AttemptTier3 ──in time, confidence ≥ floor──▶ Accepted ──▶ validator
//!      │ timeout / error / below floor / disabled
//!      ▼
//! Unresolved ──▶ "please rephrase" rejection
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::timeout;
use uuid::Uuid;
use vq_protocol::{IntentCandidate, IntentKind, Rejection, SourceTier};

use crate::catalog::EntityCatalog;
use crate::config::{IntentFloors, ResolverConfig};
use crate::error::ConfigError;
use crate::inference::semantic::{SemanticParser, schema_description};
use crate::inference::{KeywordMatcher, PatternRouter};
use crate::time_range::{SystemClock, TimeRangeParser};
use crate::validator::{EntityValidator, ValidatedCommand};

/// Result of resolving one utterance.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Validated(ValidatedCommand),
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_validated(&self) -> bool {
        matches!(self, Outcome::Validated(_))
    }

    pub fn command(&self) -> Option<&ValidatedCommand> {
        match self {
            Outcome::Validated(cmd) => Some(cmd),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Rejected(r) => Some(r),
            Outcome::Validated(_) => None,
        }
    }
}

/// Envelope returned for every utterance.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub id: Uuid,
    pub utterance: String,
    pub outcome: Outcome,
    /// Tier whose candidate reached the validator, if any.
    pub tier: Option<SourceTier>,
    pub tiers_attempted: Vec<SourceTier>,
    pub catalog_version: u64,
    pub latency_ms: u64,
    pub resolved_at: DateTime<Utc>,
}

/// Arbiter states.
#[derive(Debug)]
enum ArbiterState {
    AttemptTier1,
    AttemptTier2,
    AttemptTier3,
    Accepted(IntentCandidate),
    Unresolved,
}

pub struct Resolver {
    patterns: PatternRouter,
    keywords: KeywordMatcher,
    semantic: Option<Arc<dyn SemanticParser>>,
    validator: EntityValidator,
    catalog: Arc<EntityCatalog>,
    keyword_floors: IntentFloors,
    semantic_floor: f64,
    semantic_timeout: Duration,
    schema: String,
}

impl Resolver {
    /// Resolver with default floors, no semantic tier, and the system clock.
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        let defaults = ResolverConfig::default();
        Self {
            patterns: PatternRouter::new(),
            keywords: KeywordMatcher::new(),
            semantic: None,
            validator: EntityValidator::new(
                defaults.floors.validator_floors(),
                defaults.max_edit_distance,
                TimeRangeParser::utc(),
            ),
            catalog,
            keyword_floors: defaults.floors.keyword_floors(),
            semantic_floor: defaults.floors.semantic,
            semantic_timeout: defaults.semantic_timeout(),
            schema: schema_description(),
        }
    }

    pub fn from_config(
        config: &ResolverConfig,
        catalog: Arc<EntityCatalog>,
        semantic: Option<Arc<dyn SemanticParser>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let time = TimeRangeParser::new(Arc::new(SystemClock), config.utc_offset()?);
        Ok(Self {
            semantic,
            validator: EntityValidator::new(
                config.floors.validator_floors(),
                config.max_edit_distance,
                time,
            ),
            keyword_floors: config.floors.keyword_floors(),
            semantic_floor: config.floors.semantic,
            semantic_timeout: config.semantic_timeout(),
            ..Self::new(catalog)
        })
    }

    pub fn with_semantic(mut self, parser: Arc<dyn SemanticParser>) -> Self {
        self.semantic = Some(parser);
        self
    }

    pub fn with_validator(mut self, validator: EntityValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_keyword_floors(mut self, floors: IntentFloors) -> Self {
        self.keyword_floors = floors;
        self
    }

    pub fn with_semantic_floor(mut self, floor: f64) -> Self {
        self.semantic_floor = floor;
        self
    }

    pub fn with_semantic_timeout(mut self, limit: Duration) -> Self {
        self.semantic_timeout = limit;
        self
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    /// Resolve one utterance. Never fails: every path ends in a validated
    /// command or a rejection with a clarification prompt.
    pub async fn resolve(&self, utterance: &str) -> Resolution {
        let started = Instant::now();
        // One snapshot for the whole traversal.
        let snapshot = self.catalog.snapshot();
        let text = utterance.trim();

        let mut attempted = Vec::new();
        let mut state = if text.is_empty() {
            ArbiterState::Unresolved
        } else {
            ArbiterState::AttemptTier1
        };

        let accepted = loop {
            state = match state {
                ArbiterState::AttemptTier1 => {
                    attempted.push(SourceTier::Pattern);
                    match self.patterns.route(text) {
                        Some(candidate) => ArbiterState::Accepted(candidate),
                        None => {
                            tracing::debug!("tier 1 missed, trying keywords");
                            ArbiterState::AttemptTier2
                        }
                    }
                }
                ArbiterState::AttemptTier2 => {
                    attempted.push(SourceTier::Keyword);
                    match self.keywords.match_intent(text, &snapshot) {
                        Some(candidate) if self.clears_keyword_floor(&candidate) => {
                            ArbiterState::Accepted(candidate)
                        }
                        Some(candidate) => {
                            tracing::debug!(
                                intent = candidate.intent_name(),
                                confidence = candidate.confidence(),
                                "tier 2 below floor, falling through"
                            );
                            ArbiterState::AttemptTier3
                        }
                        None => {
                            tracing::debug!("tier 2 missed");
                            ArbiterState::AttemptTier3
                        }
                    }
                }
                ArbiterState::AttemptTier3 => match &self.semantic {
                    Some(parser) => {
                        attempted.push(SourceTier::Semantic);
                        match self.ask_semantic(parser.as_ref(), text).await {
                            Some(candidate) => ArbiterState::Accepted(candidate),
                            None => ArbiterState::Unresolved,
                        }
                    }
                    None => {
                        tracing::debug!("no semantic backend configured");
                        ArbiterState::Unresolved
                    }
                },
                ArbiterState::Accepted(candidate) => break Some(candidate),
                ArbiterState::Unresolved => break None,
            };
        };

        let (outcome, tier) = match accepted {
            Some(candidate) => {
                let tier = candidate.source_tier();
                tracing::info!(
                    tier = %tier,
                    intent = candidate.intent_name(),
                    confidence = candidate.confidence(),
                    "candidate accepted"
                );
                let outcome = match self.validator.validate(&candidate, &snapshot) {
                    Ok(cmd) => Outcome::Validated(cmd),
                    Err(rejection) => Outcome::Rejected(rejection),
                };
                (outcome, Some(tier))
            }
            None => {
                tracing::info!(tiers = attempted.len(), "utterance unresolved");
                (Outcome::Rejected(Rejection::unresolved()), None)
            }
        };

        Resolution {
            id: Uuid::now_v7(),
            utterance: utterance.to_string(),
            outcome,
            tier,
            tiers_attempted: attempted,
            catalog_version: snapshot.version(),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            resolved_at: Utc::now(),
        }
    }

    fn clears_keyword_floor(&self, candidate: &IntentCandidate) -> bool {
        candidate
            .intent_name()
            .parse::<IntentKind>()
            .is_ok_and(|intent| candidate.confidence() >= self.keyword_floors.get(intent))
    }

    /// Tier 3 under a hard deadline. Every failure mode is a miss.
    async fn ask_semantic(
        &self,
        parser: &dyn SemanticParser,
        text: &str,
    ) -> Option<IntentCandidate> {
        let guess = match timeout(self.semantic_timeout, parser.parse(text, &self.schema)).await {
            Ok(Ok(Some(guess))) => guess,
            Ok(Ok(None)) => {
                tracing::debug!(backend = parser.backend_name(), "semantic model returned no match");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = parser.backend_name(), error = %e, "semantic model failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    backend = parser.backend_name(),
                    timeout_ms = u64::try_from(self.semantic_timeout.as_millis()).unwrap_or(u64::MAX),
                    "semantic model timed out"
                );
                return None;
            }
        };

        let candidate = guess.into_candidate()?;
        if candidate.confidence() < self.semantic_floor {
            tracing::debug!(
                intent = candidate.intent_name(),
                confidence = candidate.confidence(),
                floor = self.semantic_floor,
                "semantic confidence below floor"
            );
            return None;
        }
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Offset, TimeZone};
    use vq_protocol::{CanonicalValue, EntityRole, RejectionKind};

    use crate::inference::semantic::SemanticGuess;
    use crate::inventory::Inventory;
    use crate::mock::{MockReply, MockSemanticParser};
    use crate::time_range::FixedClock;

    fn catalog() -> Arc<EntityCatalog> {
        Arc::new(EntityCatalog::new(Inventory::new(
            ["Compressor-1", "Compressor-2", "HVAC", "Boiler-1"],
            ["power", "energy", "temperature"],
        )))
    }

    fn resolver() -> Resolver {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 14, 30, 0).unwrap();
        let time = TimeRangeParser::new(Arc::new(FixedClock(now)), Utc.fix());
        Resolver::new(catalog()).with_validator(EntityValidator::new(
            IntentFloors::validator_defaults(),
            2,
            time,
        ))
    }

    fn boiler_guess(confidence: f64) -> SemanticGuess {
        SemanticGuess::new("metric_query", confidence)
            .with_entity("machine", "Boiler-1")
            .with_entity("metric", "temperature")
    }

    #[tokio::test]
    async fn pattern_hit_skips_other_tiers() {
        let semantic = Arc::new(MockSemanticParser::guessing(boiler_guess(0.9)));
        let r = resolver().with_semantic(semantic.clone()).resolve("top 3").await;

        let cmd = r.outcome.command().expect("validated");
        assert_eq!(cmd.intent(), IntentKind::RankingQuery);
        assert_eq!(cmd.entity(EntityRole::Limit), Some(&CanonicalValue::Limit(3)));
        assert_eq!(r.tier, Some(SourceTier::Pattern));
        assert_eq!(r.tiers_attempted, vec![SourceTier::Pattern]);
        assert_eq!(semantic.calls(), 0);
    }

    #[tokio::test]
    async fn keyword_tier_with_fuzzy_correction() {
        let semantic = Arc::new(MockSemanticParser::guessing(boiler_guess(0.9)));
        let r = resolver()
            .with_semantic(semantic.clone())
            .resolve("Compresser-1 power")
            .await;

        let cmd = r.outcome.command().expect("validated");
        assert_eq!(cmd.intent(), IntentKind::MetricQuery);
        assert_eq!(
            cmd.entity(EntityRole::Machine),
            Some(&CanonicalValue::Machine("Compressor-1".into()))
        );
        assert_eq!(cmd.warnings().len(), 1);
        assert_eq!(r.tier, Some(SourceTier::Keyword));
        assert_eq!(r.tiers_attempted, vec![SourceTier::Pattern, SourceTier::Keyword]);
        assert_eq!(semantic.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_machine_is_rejected_not_substituted() {
        let r = resolver().resolve("Machine-99 status").await;
        let rejection = r.outcome.rejection().expect("rejected");
        assert_eq!(rejection.kind, RejectionKind::UnknownEntity);
        assert!(rejection.clarification_prompt.contains("Machine-99"));
        assert_eq!(r.tier, Some(SourceTier::Pattern));
    }

    #[tokio::test]
    async fn numbered_variant_of_known_machine_is_rejected() {
        for utterance in ["HVAC-99 status", "what is the status of Boiler-2", "HVAC-99 energy"] {
            let r = resolver().resolve(utterance).await;
            let rejection = r.outcome.rejection().expect(utterance);
            assert_eq!(rejection.kind, RejectionKind::UnknownEntity, "{utterance}");
        }

        let pumps = Resolver::new(Arc::new(EntityCatalog::new(Inventory::new(
            ["Pump", "Boiler"],
            ["power"],
        ))));
        let r = pumps.resolve("Pump 7 status").await;
        assert_eq!(r.outcome.rejection().unwrap().kind, RejectionKind::UnknownEntity);
    }

    #[tokio::test]
    async fn absolute_range_resolves_to_time_range() {
        let r = resolver()
            .resolve("power of HVAC from 2026-03-01 to 2026-03-05")
            .await;
        let cmd = r.outcome.command().expect("validated");
        assert_eq!(cmd.intent(), IntentKind::MetricQuery);
        assert_eq!(
            cmd.entity(EntityRole::Machine),
            Some(&CanonicalValue::Machine("HVAC".into()))
        );
        let Some(CanonicalValue::TimeRange(range)) = cmd.entity(EntityRole::TimeExpression) else {
            panic!("no time range in {cmd:?}");
        };
        assert_eq!(range.start(), Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end(), Utc.with_ymd_and_hms(2026, 3, 6, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn duration_number_does_not_become_limit() {
        let r = resolver()
            .resolve("which machines used the most energy in the last 7 days")
            .await;
        let cmd = r.outcome.command().expect("validated");
        assert_eq!(cmd.intent(), IntentKind::RankingQuery);
        assert_eq!(cmd.entity(EntityRole::Limit), None);
        assert!(matches!(
            cmd.entity(EntityRole::TimeExpression),
            Some(CanonicalValue::TimeRange(_))
        ));
    }

    #[tokio::test]
    async fn bare_compare_asks_for_machines() {
        let r = resolver().resolve("compare").await;
        let rejection = r.outcome.rejection().expect("rejected");
        assert_eq!(rejection.kind, RejectionKind::InsufficientEntities);
    }

    #[tokio::test]
    async fn semantic_fallback_when_earlier_tiers_miss() {
        let semantic = Arc::new(MockSemanticParser::guessing(boiler_guess(0.8)));
        let r = resolver()
            .with_semantic(semantic.clone())
            .resolve("gimme the scoop on boiler-1")
            .await;

        let cmd = r.outcome.command().expect("validated");
        assert_eq!(cmd.intent(), IntentKind::MetricQuery);
        assert_eq!(cmd.source_tier(), SourceTier::Semantic);
        assert_eq!(r.tier, Some(SourceTier::Semantic));
        assert_eq!(
            r.tiers_attempted,
            vec![SourceTier::Pattern, SourceTier::Keyword, SourceTier::Semantic]
        );
        assert_eq!(semantic.seen(), vec!["gimme the scoop on boiler-1"]);
    }

    #[tokio::test]
    async fn keyword_below_floor_falls_through() {
        let semantic = Arc::new(MockSemanticParser::guessing(boiler_guess(0.9)));
        let r = resolver()
            .with_keyword_floors(IntentFloors::uniform(0.99))
            .with_semantic(semantic.clone())
            .resolve("Compresser-1 power")
            .await;
        assert_eq!(r.tier, Some(SourceTier::Semantic));
        assert_eq!(semantic.calls(), 1);
    }

    #[tokio::test]
    async fn semantic_timeout_is_unresolved() {
        let semantic = Arc::new(MockSemanticParser::slow(
            Duration::from_secs(5),
            boiler_guess(0.9),
        ));
        let started = Instant::now();
        let r = resolver()
            .with_semantic(semantic)
            .with_semantic_timeout(Duration::from_millis(50))
            .resolve("gimme the scoop on boiler-1")
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(r.outcome.rejection().unwrap().kind, RejectionKind::Unresolved);
        assert_eq!(r.tier, None);
        assert_eq!(r.tiers_attempted.len(), 3);
    }

    #[tokio::test]
    async fn semantic_failure_is_unresolved() {
        for reply in [MockReply::Fail, MockReply::NoMatch] {
            let r = resolver()
                .with_semantic(Arc::new(MockSemanticParser::new(reply)))
                .resolve("gimme the scoop on boiler-1")
                .await;
            assert_eq!(r.outcome.rejection().unwrap().kind, RejectionKind::Unresolved);
        }
    }

    #[tokio::test]
    async fn semantic_below_floor_is_unresolved() {
        let r = resolver()
            .with_semantic(Arc::new(MockSemanticParser::guessing(boiler_guess(0.4))))
            .resolve("gimme the scoop on boiler-1")
            .await;
        let rejection = r.outcome.rejection().unwrap();
        assert_eq!(rejection.kind, RejectionKind::Unresolved);
        assert!(rejection.clarification_prompt.contains("rephrase"));
    }

    #[tokio::test]
    async fn semantic_unsupported_intent_is_fatal() {
        let r = resolver()
            .with_semantic(Arc::new(MockSemanticParser::guessing(SemanticGuess::new(
                "weather_query",
                0.95,
            ))))
            .resolve("will it rain on the roof")
            .await;
        assert_eq!(
            r.outcome.rejection().unwrap().kind,
            RejectionKind::UnsupportedIntent
        );
        assert_eq!(r.tier, Some(SourceTier::Semantic));
    }

    #[tokio::test]
    async fn no_semantic_backend_stops_after_tier2() {
        let r = resolver().resolve("gimme the scoop on boiler-1").await;
        assert_eq!(r.outcome.rejection().unwrap().kind, RejectionKind::Unresolved);
        assert_eq!(r.tiers_attempted, vec![SourceTier::Pattern, SourceTier::Keyword]);
    }

    #[tokio::test]
    async fn empty_utterance_attempts_nothing() {
        let r = resolver().resolve("   ").await;
        assert_eq!(r.outcome.rejection().unwrap().kind, RejectionKind::Unresolved);
        assert!(r.tiers_attempted.is_empty());
    }

    #[tokio::test]
    async fn catalog_swap_applies_to_next_resolution() {
        let resolver = resolver();
        let r = resolver.resolve("HVAC status").await;
        assert!(r.outcome.is_validated());
        assert_eq!(r.catalog_version, 1);

        resolver
            .catalog()
            .replace(Inventory::new(["Chiller-1"], ["power"]))
            .unwrap();

        let r = resolver.resolve("HVAC status").await;
        assert_eq!(r.outcome.rejection().unwrap().kind, RejectionKind::UnknownEntity);
        assert_eq!(r.catalog_version, 2);
    }

    #[tokio::test]
    async fn resolution_serializes_with_status_tag() {
        let r = resolver().resolve("top 3").await;
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["outcome"]["status"], "validated");
        assert_eq!(json["outcome"]["intent"], "ranking_query");
        assert_eq!(json["outcome"]["entities"]["limit"]["value"], 3);
        assert_eq!(json["tier"], "pattern");
    }

    #[test]
    fn from_config_applies_floors() {
        let config = ResolverConfig::from_toml("[floors.validator]\nranking_query = 0.9\n").unwrap();
        let resolver = Resolver::from_config(&config, catalog(), None).unwrap();
        assert_eq!(
            resolver.validator.floors().get(IntentKind::RankingQuery),
            0.9
        );
        assert!(resolver.semantic.is_none());
    }
}
