//! Tier 2: keyword intent matcher.
//!
//! Scores the utterance against a requirement profile per intent and
//! recognizes catalog entities in the text. The score is the matcher's own
//! measure of fit; whether it is good enough is the arbiter's call.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use vq_protocol::{EntityRole, IntentCandidate, IntentKind, SourceTier};

use crate::catalog::{CatalogSnapshot, NameSet};
use crate::inference::rules::TIME;
use crate::normalize::{contains_on_boundary, looks_like_identifier, normalize};

/// Below this the best intent is treated as noise.
pub const NOISE_FLOOR: f64 = 0.3;

const REQUIRED_WEIGHT: f64 = 0.6;
const OPTIONAL_WEIGHT: f64 = 0.1;
const MAX_OPTIONAL: usize = 2;
const CATALOG_ENTITY_BOOST: f64 = 0.25;
const IDENTIFIER_BOOST: f64 = 0.1;

/// Metric vocabulary recognized even when the catalog spells tokens differently.
const METRIC_WORDS: &[&str] = &[
    "power",
    "energy",
    "consumption",
    "temperature",
    "temp",
    "pressure",
    "vibration",
    "current",
    "voltage",
    "flow",
    "runtime",
    "uptime",
    "efficiency",
    "load",
    "kwh",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "what", "whats", "how", "show", "with", "from", "this", "that", "last",
    "past", "today", "yesterday", "week", "month", "hours", "days", "are", "was", "which", "give",
    "tell", "please", "about", "machine", "machines", "unit", "all",
];

static RE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{TIME}\b")).unwrap());

static RE_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d+|one|two|three|four|five|six|seven|eight|nine|ten)$").unwrap()
});

/// One condition a profile can ask for.
#[derive(Debug, Clone, Copy)]
enum Requirement {
    /// Any of these words or phrases.
    Keywords(&'static [&'static str]),
    /// A metric word or a catalog metric token.
    Metric,
    /// A recognizable time expression.
    Time,
}

struct IntentProfile {
    intent: IntentKind,
    required: &'static [Requirement],
    optional: &'static [Requirement],
    /// How many machine slots the intent takes.
    machine_slots: usize,
}

// Order doubles as the tie-break.
const PROFILES: &[IntentProfile] = &[
    IntentProfile {
        intent: IntentKind::ComparisonQuery,
        required: &[Requirement::Keywords(&[
            "compare",
            "comparison",
            "versus",
            "vs",
            "difference",
            "between",
            "against",
        ])],
        optional: &[Requirement::Metric, Requirement::Time],
        machine_slots: 2,
    },
    IntentProfile {
        intent: IntentKind::RankingQuery,
        required: &[Requirement::Keywords(&[
            "top", "highest", "most", "biggest", "largest", "rank", "ranking", "ranked", "lowest",
            "least", "worst", "best",
        ])],
        optional: &[
            Requirement::Keywords(&["consumer", "consumers", "users", "machines", "list"]),
            Requirement::Metric,
        ],
        machine_slots: 0,
    },
    IntentProfile {
        intent: IntentKind::MetricQuery,
        required: &[Requirement::Metric],
        optional: &[
            Requirement::Keywords(&["what", "how", "much", "show", "get", "reading", "value"]),
            Requirement::Time,
        ],
        machine_slots: 1,
    },
    IntentProfile {
        intent: IntentKind::StatusQuery,
        required: &[Requirement::Keywords(&[
            "status", "state", "condition", "running", "online", "offline", "working", "doing",
            "health", "alarm", "alarms", "fault", "faults", "down",
        ])],
        optional: &[Requirement::Keywords(&["what", "how", "is", "check", "show"])],
        machine_slots: 1,
    },
    IntentProfile {
        intent: IntentKind::OverviewQuery,
        required: &[Requirement::Keywords(&[
            "overview",
            "summary",
            "summarize",
            "everything",
            "plant",
            "factory",
            "facility",
            "site",
            "all machines",
        ])],
        optional: &[
            Requirement::Keywords(&["how", "status", "give", "show"]),
            Requirement::Time,
        ],
        machine_slots: 0,
    },
];

/// Machines found in the utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Recognition {
    /// Catalog names, in order of appearance.
    Catalog(Vec<String>),
    /// Identifier-shaped tokens that match nothing in the catalog.
    Identifier(Vec<String>),
    /// A fragment matched several catalog names; left unbound.
    Ambiguous,
    None,
}

/// Pre-digested utterance shared by every profile.
struct Features {
    text: String,
    metric: Option<String>,
    time: Option<String>,
    limit: Option<String>,
    machines: Recognition,
}

impl Features {
    fn extract(raw: &str, catalog: &CatalogSnapshot) -> Self {
        let text = clean(raw);
        let time_span = RE_TIME
            .captures(raw)
            .and_then(|c| c.name("time_expression"));
        // Numbers inside the time phrase are neither limits nor machine names.
        let rest = match time_span {
            Some(m) => format!("{} {}", &raw[..m.start()], &raw[m.end()..]),
            None => raw.to_string(),
        };
        Self {
            metric: find_metric(&text, catalog.metrics()),
            time: time_span.map(|m| m.as_str().to_string()),
            limit: find_limit(&rest),
            machines: recognize_machines(&rest, &clean(&rest), catalog.entities()),
            text,
        }
    }

    fn satisfies(&self, req: &Requirement) -> bool {
        match req {
            Requirement::Keywords(words) => words
                .iter()
                .any(|w| contains_on_boundary(&self.text, &normalize(w))),
            Requirement::Metric => self.metric.is_some(),
            Requirement::Time => self.time.is_some(),
        }
    }
}

/// Keyword scorer over the fixed intent profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Score for every intent, in profile order.
    pub fn score_all(&self, text: &str, catalog: &CatalogSnapshot) -> Vec<(IntentKind, f64)> {
        let features = Features::extract(text, catalog);
        PROFILES
            .iter()
            .map(|p| (p.intent, score(p, &features)))
            .collect()
    }

    /// Best-scoring intent as a candidate, or `None` below the noise floor.
    pub fn match_intent(&self, text: &str, catalog: &CatalogSnapshot) -> Option<IntentCandidate> {
        let features = Features::extract(text, catalog);

        let mut best: Option<(&IntentProfile, f64)> = None;
        for profile in PROFILES {
            let s = score(profile, &features);
            if best.is_none_or(|(_, b)| s > b) {
                best = Some((profile, s));
            }
        }
        let (profile, confidence) = best?;

        if confidence < NOISE_FLOOR {
            tracing::debug!(confidence, "keyword score below noise floor");
            return None;
        }

        let entities = bind_entities(profile, &features);
        tracing::debug!(
            intent = %profile.intent,
            confidence,
            entities = entities.len(),
            "keyword match"
        );
        Some(IntentCandidate::new(
            profile.intent.as_str(),
            entities,
            confidence,
            SourceTier::Keyword,
        ))
    }
}

fn score(profile: &IntentProfile, features: &Features) -> f64 {
    let required_hit = profile
        .required
        .iter()
        .filter(|r| features.satisfies(r))
        .count();
    let required = if profile.required.is_empty() {
        1.0
    } else {
        required_hit as f64 / profile.required.len() as f64
    };

    let optional_hit = profile
        .optional
        .iter()
        .filter(|r| features.satisfies(r))
        .count()
        .min(MAX_OPTIONAL);

    let entity_boost = if profile.machine_slots == 0 {
        0.0
    } else {
        match features.machines {
            Recognition::Catalog(_) => CATALOG_ENTITY_BOOST,
            Recognition::Identifier(_) => IDENTIFIER_BOOST,
            Recognition::Ambiguous | Recognition::None => 0.0,
        }
    };

    (REQUIRED_WEIGHT * required + OPTIONAL_WEIGHT * optional_hit as f64 + entity_boost)
        .clamp(0.0, 1.0)
}

fn bind_entities(profile: &IntentProfile, features: &Features) -> BTreeMap<EntityRole, String> {
    let mut entities = BTreeMap::new();

    let machines: &[String] = match &features.machines {
        Recognition::Catalog(names) | Recognition::Identifier(names) => names,
        Recognition::Ambiguous | Recognition::None => &[],
    };
    let roles = [EntityRole::Machine, EntityRole::SecondMachine];
    for (role, name) in roles
        .iter()
        .take(profile.machine_slots)
        .zip(machines.iter())
    {
        entities.insert(*role, name.clone());
    }

    if matches!(
        profile.intent,
        IntentKind::MetricQuery | IntentKind::RankingQuery | IntentKind::ComparisonQuery
    ) && let Some(metric) = &features.metric
    {
        entities.insert(EntityRole::Metric, metric.clone());
    }
    if let Some(time) = &features.time {
        entities.insert(EntityRole::TimeExpression, time.clone());
    }
    if profile.intent == IntentKind::RankingQuery
        && let Some(limit) = &features.limit
    {
        entities.insert(EntityRole::Limit, limit.clone());
    }
    entities
}

/// Drop apostrophes, blank out other punctuation, normalize.
fn clean(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();
    normalize(&spaced)
}

/// Catalog metric first (canonical spelling), then the built-in vocabulary.
fn find_metric(text: &str, metrics: &NameSet) -> Option<String> {
    if let Some(hit) = metrics
        .names()
        .iter()
        .filter(|m| contains_on_boundary(text, &m.normalized))
        .max_by_key(|m| m.normalized.len())
    {
        return Some(hit.canonical.clone());
    }
    METRIC_WORDS
        .iter()
        .find(|w| contains_on_boundary(text, w))
        .map(|w| (*w).to_string())
}

/// First standalone count. Tokens like `Compressor-1` are names, not counts.
fn find_limit(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|t| RE_LIMIT.is_match(t))
        .map(str::to_string)
}

fn is_vocabulary(token: &str) -> bool {
    STOPWORDS.contains(&token)
        || METRIC_WORDS.contains(&token)
        || PROFILES.iter().any(|p| {
            p.required.iter().chain(p.optional).any(|r| match r {
                Requirement::Keywords(words) => words.contains(&token),
                _ => false,
            })
        })
}

fn recognize_machines(raw: &str, text: &str, entities: &NameSet) -> Recognition {
    // Full mentions: catalog names appearing on separator boundaries. A
    // mention followed by a number ("hvac-99") names some other machine and
    // is kept whole, without a canonical name.
    let mut mentions: Vec<(usize, usize, Option<&str>)> = Vec::new();
    for name in entities.names() {
        for (idx, _) in text.match_indices(name.normalized.as_str()) {
            let end = idx + name.normalized.len();
            if !(idx == 0 || text[..idx].ends_with('-'))
                || !(end == text.len() || text[end..].starts_with('-'))
            {
                continue;
            }
            let after = text[end..].strip_prefix('-').unwrap_or("");
            let next = after.split('-').next().unwrap_or("");
            if next.starts_with(|c: char| c.is_ascii_digit()) {
                mentions.push((idx, end + 1 + next.len(), None));
            } else {
                mentions.push((idx, end, Some(name.canonical.as_str())));
            }
        }
    }
    if !mentions.is_empty() {
        // Longest mention wins where mentions overlap; a catalog name beats
        // an extended mention of the same span.
        mentions.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.is_none().cmp(&b.2.is_none()))
        });
        let mut names: Vec<String> = Vec::new();
        let mut unknown = false;
        let mut covered = 0;
        for (start, end, canonical) in mentions {
            if start < covered {
                continue;
            }
            covered = end;
            let name = match canonical {
                Some(canonical) => canonical.to_string(),
                None => {
                    unknown = true;
                    text[start..end].to_string()
                }
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        return if unknown {
            Recognition::Identifier(names)
        } else {
            Recognition::Catalog(names)
        };
    }

    // Prefix fragments: bind only when exactly one name shares the prefix.
    let mut prefix_hits: Vec<String> = Vec::new();
    for token in text.split('-') {
        if token.chars().count() < 3 || is_vocabulary(token) {
            continue;
        }
        let hits: Vec<&str> = entities
            .names()
            .iter()
            .filter(|n| n.normalized.starts_with(token))
            .map(|n| n.canonical.as_str())
            .collect();
        match hits.as_slice() {
            [] => {}
            [one] => {
                if !prefix_hits.iter().any(|h| h == one) {
                    prefix_hits.push((*one).to_string());
                }
            }
            _ => return Recognition::Ambiguous,
        }
    }
    if !prefix_hits.is_empty() {
        return Recognition::Catalog(prefix_hits);
    }

    // Identifier-shaped tokens go to the validator raw for fuzzy matching.
    let identifiers: Vec<String> = raw
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_'))
        .map(|t| t.trim_end_matches("'s"))
        .filter(|t| t.chars().next().is_some_and(|c| c.is_alphabetic()))
        .filter(|t| looks_like_identifier(t))
        .map(str::to_string)
        .collect();
    if identifiers.is_empty() {
        Recognition::None
    } else {
        Recognition::Identifier(identifiers)
    }
}
