//! Zero-trust entity validator.
//!
//! Every candidate, whichever tier produced it, passes through here before
//! anything downstream sees it. Checks run in a fixed order; the first
//! failure picks the rejection kind and clarification prompt, but later
//! checks still run so the suggestion list is complete.

use std::collections::BTreeMap;

use serde::Serialize;
use vq_protocol::{
    CanonicalValue, EntityRole, IntentCandidate, IntentKind, Rejection, RejectionKind, SourceTier,
};

use crate::catalog::{CatalogSnapshot, Lookup, NameSet};
use crate::config::IntentFloors;
use crate::normalize::same_numbers;
use crate::time_range::{ACCEPTED_FORMATS, TimeRangeParser};

/// Most suggestions offered for one unknown name.
const MAX_SUGGESTIONS: usize = 3;

/// Inclusive bounds for ranking limits.
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 50;

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

/// A candidate that passed every check. Only the validator builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedCommand {
    intent: IntentKind,
    entities: BTreeMap<EntityRole, CanonicalValue>,
    confidence: f64,
    source_tier: SourceTier,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl ValidatedCommand {
    pub fn intent(&self) -> IntentKind {
        self.intent
    }

    pub fn entities(&self) -> &BTreeMap<EntityRole, CanonicalValue> {
        &self.entities
    }

    pub fn entity(&self, role: EntityRole) -> Option<&CanonicalValue> {
        self.entities.get(&role)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source_tier(&self) -> SourceTier {
        self.source_tier
    }

    /// Soft failures and fuzzy corrections, in check order.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Rebuild a candidate from the canonical values.
    pub fn to_candidate(&self) -> IntentCandidate {
        IntentCandidate::new(
            self.intent.as_str(),
            self.entities
                .iter()
                .map(|(role, value)| (*role, value.as_raw()))
                .collect(),
            self.confidence,
            self.source_tier,
        )
    }
}

/// Outcome of resolving one machine mention.
enum NameCheck {
    Accepted(String),
    Corrected { from: String, to: String },
    Ambiguous(Vec<String>),
    Unknown(Vec<String>),
}

/// Rejection state accumulated across checks.
#[derive(Default)]
struct Findings {
    first: Option<(RejectionKind, String)>,
    reasons: Vec<String>,
    suggestions: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn fail(&mut self, kind: RejectionKind, reason: String, prompt: String) {
        if self.first.is_none() {
            self.first = Some((kind, prompt));
        }
        self.reasons.push(reason);
    }

    fn suggest(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            if !self.suggestions.contains(&name) {
                self.suggestions.push(name);
            }
        }
    }

    fn into_rejection(self) -> Option<Rejection> {
        let (kind, clarification_prompt) = self.first?;
        Some(Rejection {
            kind,
            reasons: self.reasons,
            suggestions: self.suggestions,
            clarification_prompt,
        })
    }
}

/// Checks candidates against the catalog, floors, and time rules.
#[derive(Debug, Clone)]
pub struct EntityValidator {
    floors: IntentFloors,
    max_edits: usize,
    time: TimeRangeParser,
}

impl EntityValidator {
    pub fn new(floors: IntentFloors, max_edits: usize, time: TimeRangeParser) -> Self {
        Self {
            floors,
            max_edits,
            time,
        }
    }

    pub fn floors(&self) -> &IntentFloors {
        &self.floors
    }

    pub fn validate(
        &self,
        candidate: &IntentCandidate,
        catalog: &CatalogSnapshot,
    ) -> Result<ValidatedCommand, Rejection> {
        let intent = match candidate.intent_name().parse::<IntentKind>() {
            Ok(intent) => intent,
            Err(_) => return Err(unsupported_intent(candidate.intent_name())),
        };

        let mut findings = Findings::default();
        let mut entities = BTreeMap::new();

        let floor = self.floors.get(intent);
        if candidate.confidence() < floor {
            findings.fail(
                RejectionKind::LowConfidence,
                format!(
                    "confidence {:.2} below {intent} floor {floor:.2}",
                    candidate.confidence()
                ),
                "I'm not sure I understood. Could you rephrase your question?".into(),
            );
        }

        for role in [EntityRole::Machine, EntityRole::SecondMachine] {
            let Some(raw) = present(candidate, role) else {
                continue;
            };
            match self.check_name(catalog.entities(), raw) {
                NameCheck::Accepted(name) => {
                    entities.insert(role, CanonicalValue::Machine(name));
                }
                NameCheck::Corrected { from, to } => {
                    tracing::info!(role = %role, from = %from, to = %to, "fuzzy-corrected machine name");
                    findings
                        .warnings
                        .push(format!("corrected machine '{from}' to '{to}'"));
                    entities.insert(role, CanonicalValue::Machine(to));
                }
                NameCheck::Ambiguous(names) => {
                    findings.fail(
                        RejectionKind::AmbiguousEntity,
                        format!("machine '{raw}' matches {} catalog entries", names.len()),
                        format!("Which one do you mean: {}?", join_or(&names)),
                    );
                    findings.suggest(names);
                }
                NameCheck::Unknown(near) => {
                    let prompt = if near.is_empty() {
                        format!("I don't know a machine called '{raw}'. Which machine did you mean?")
                    } else {
                        format!(
                            "I don't know a machine called '{raw}'. Did you mean {}?",
                            join_or(&near)
                        )
                    };
                    findings.fail(
                        RejectionKind::UnknownEntity,
                        format!("machine '{raw}' is not in the catalog"),
                        prompt,
                    );
                    findings.suggest(near);
                }
            }
        }

        if intent == IntentKind::StatusQuery && present(candidate, EntityRole::Machine).is_none() {
            findings.fail(
                RejectionKind::MissingEntity,
                "status query names no machine".into(),
                "Which machine would you like the status of?".into(),
            );
        }

        if let Some(raw) = present(candidate, EntityRole::Metric) {
            // Unknown metrics never block the command.
            match self.check_name(catalog.metrics(), raw) {
                NameCheck::Accepted(token) => {
                    entities.insert(EntityRole::Metric, CanonicalValue::Metric(token));
                }
                NameCheck::Corrected { from, to } => {
                    findings
                        .warnings
                        .push(format!("corrected metric '{from}' to '{to}'"));
                    entities.insert(EntityRole::Metric, CanonicalValue::Metric(to));
                }
                NameCheck::Ambiguous(_) | NameCheck::Unknown(_) => {
                    tracing::debug!(metric = %raw, "dropping unrecognized metric");
                    findings
                        .warnings
                        .push(format!("unrecognized metric '{raw}' ignored"));
                }
            }
        }

        if let Some(raw) = present(candidate, EntityRole::TimeExpression) {
            match self.time.parse(raw) {
                Ok(range) => {
                    entities.insert(EntityRole::TimeExpression, CanonicalValue::TimeRange(range));
                }
                Err(e) => findings.fail(
                    RejectionKind::InvalidTimeRange,
                    format!("time expression '{raw}': {e}"),
                    format!("I couldn't work out the time range '{raw}'. Try {ACCEPTED_FORMATS}."),
                ),
            }
        }

        if let Some(raw) = present(candidate, EntityRole::Limit) {
            match parse_limit(raw) {
                Some(n) => {
                    entities.insert(EntityRole::Limit, CanonicalValue::Limit(n));
                }
                None => findings.fail(
                    RejectionKind::InvalidLimit,
                    format!("limit '{raw}' is not a number from {MIN_LIMIT} to {MAX_LIMIT}"),
                    format!("How many should I list? Pick a number from {MIN_LIMIT} to {MAX_LIMIT}."),
                ),
            }
        }

        if intent == IntentKind::ComparisonQuery {
            let first = entities.get(&EntityRole::Machine).and_then(CanonicalValue::as_machine);
            let second = entities
                .get(&EntityRole::SecondMachine)
                .and_then(CanonicalValue::as_machine);
            let distinct = match (first, second) {
                (Some(a), Some(b)) if a != b => 2,
                (None, None) => 0,
                _ => 1,
            };
            if distinct < 2 {
                findings.fail(
                    RejectionKind::InsufficientEntities,
                    format!("comparison needs two distinct machines, found {distinct}"),
                    "Which two machines would you like to compare?".into(),
                );
            }
        }

        let warnings = std::mem::take(&mut findings.warnings);
        if let Some(rejection) = findings.into_rejection() {
            tracing::debug!(
                intent = %intent,
                kind = ?rejection.kind,
                reasons = rejection.reasons.len(),
                "candidate rejected"
            );
            return Err(rejection);
        }

        Ok(ValidatedCommand {
            intent,
            entities,
            confidence: candidate.confidence(),
            source_tier: candidate.source_tier(),
            warnings,
        })
    }

    /// Lookup, then fuzzy fallback. A unique strictly-nearest entry within
    /// the edit threshold is substituted when its numbers match; anything
    /// else is a failure.
    fn check_name(&self, set: &NameSet, raw: &str) -> NameCheck {
        match set.lookup(raw) {
            Lookup::Found(name) => NameCheck::Accepted(name),
            Lookup::Ambiguous(names) => NameCheck::Ambiguous(names),
            Lookup::NotFound => {
                let near = set.nearest(raw, self.max_edits);
                match near.as_slice() {
                    [(only, _)] if same_numbers(raw, only) => NameCheck::Corrected {
                        from: raw.to_string(),
                        to: only.clone(),
                    },
                    [(best, d0), (_, d1), ..] if d0 < d1 && same_numbers(raw, best) => {
                        NameCheck::Corrected {
                            from: raw.to_string(),
                            to: best.clone(),
                        }
                    }
                    _ => NameCheck::Unknown(
                        near.into_iter()
                            .take(MAX_SUGGESTIONS)
                            .map(|(name, _)| name)
                            .collect(),
                    ),
                }
            }
        }
    }
}

/// A role's raw value; blank values count as absent.
fn present(candidate: &IntentCandidate, role: EntityRole) -> Option<&str> {
    candidate
        .entity(role)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn unsupported_intent(name: &str) -> Rejection {
    Rejection {
        kind: RejectionKind::UnsupportedIntent,
        reasons: vec![format!("unsupported intent '{name}'")],
        suggestions: Vec::new(),
        clarification_prompt:
            "I can't answer that kind of question. Try asking about a machine's status or a metric."
                .into(),
    }
}

/// Digits or a spelled-out number up to ten, within the limit bounds.
fn parse_limit(raw: &str) -> Option<u32> {
    let raw = raw.trim().to_lowercase();
    let n = match raw.parse::<u32>() {
        Ok(n) => n,
        Err(_) => NUMBER_WORDS.iter().find(|(w, _)| *w == raw).map(|(_, n)| *n)?,
    };
    (MIN_LIMIT..=MAX_LIMIT).contains(&n).then_some(n)
}

fn join_or(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} or {last}", init.join(", ")),
    }
}
