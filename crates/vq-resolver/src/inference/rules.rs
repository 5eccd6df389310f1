//! Tier 1: deterministic pattern router.
//!
//! Handles the common phrasings at zero cost and sub-millisecond latency.
//! Rules are tried in order and the first match wins, so they are written
//! most-specific-first: two-entity forms, then single-entity forms, then
//! bare keyword forms. Captured text is handed downstream untouched; this
//! tier proposes, the validator decides.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use vq_protocol::{EntityRole, IntentCandidate, IntentKind, SourceTier};

/// Pattern matches are deterministic, so they always report this.
pub const PATTERN_CONFIDENCE: f64 = 0.95;

const METRIC: &str = r"(?P<metric>power(?:\s+consumption|\s+usage|\s+draw)?|energy(?:\s+consumption|\s+usage)?|consumption|temperature|temp|pressure|vibration|current|voltage|flow(?:\s+rate)?|runtime|uptime|efficiency|load)";

pub(crate) const TIME: &str = r"(?P<time_expression>\d{4}-\d{2}-\d{2}(?:[T\s]\d{2}:\d{2}(?::\d{2})?(?:Z|[+-]\d{2}:\d{2})?)?\s+(?:to|until|and|-)\s+\d{4}-\d{2}-\d{2}(?:[T\s]\d{2}:\d{2}(?::\d{2})?(?:Z|[+-]\d{2}:\d{2})?)?|today|yesterday|this\s+week|last\s+week|this\s+month|last\s+month|(?:last|past)\s+\d+\s+(?:minutes?|hours?|days?|weeks?)|(?:last|past)\s+(?:hour|day)|\d+\s?[mhdw])";

/// Machine mentions are short: at most four name-like tokens, no punctuation.
const MACHINE: &str = r"(?P<machine>[\w-]+(?:\s+[\w-]+){0,3}?)";
const SECOND_MACHINE: &str = r"(?P<second_machine>[\w-]+(?:\s+[\w-]+){0,3}?)";

const LIMIT: &str = r"(?P<limit>\d+|one|two|three|four|five|six|seven|eight|nine|ten)";

/// One pattern → intent rule.
struct PatternRule {
    name: &'static str,
    intent: IntentKind,
    regex: Regex,
}

impl PatternRule {
    fn new(name: &'static str, intent: IntentKind, pattern: &str) -> Self {
        // Patterns are compile-time constants; a bad one is a programming error.
        let regex = Regex::new(&format!("(?i)^{pattern}$"))
            .unwrap_or_else(|e| panic!("invalid pattern rule {name}: {e}"));
        Self {
            name,
            intent,
            regex,
        }
    }
}

fn time_clause() -> String {
    format!(r"(?:(?:in|over|for|during|from|since|between)\s+(?:the\s+)?)?{TIME}")
}

static RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    let time = time_clause();
    vec![
        // ── Two-entity forms ────────────────────────────────────────
        PatternRule::new(
            "compare_two",
            IntentKind::ComparisonQuery,
            &format!(
                r"(?:please\s+)?compare\s+(?:the\s+)?{MACHINE}\s+(?:and|with|to|against|vs\.?|versus)\s+(?:the\s+)?{SECOND_MACHINE}(?:\s+(?:on|by|for)\s+{METRIC})?(?:\s+{time})?"
            ),
        ),
        PatternRule::new(
            "versus",
            IntentKind::ComparisonQuery,
            &format!(
                r"{MACHINE}\s+(?:vs\.?|versus)\s+{SECOND_MACHINE}(?:\s+{time})?"
            ),
        ),
        // ── Single-entity forms ─────────────────────────────────────
        PatternRule::new(
            "metric_of_machine",
            IntentKind::MetricQuery,
            &format!(
                r"(?:(?:what(?:'s|\s+is|\s+was)|show(?:\s+me)?|get|give\s+me|tell\s+me)\s+)?(?:the\s+)?{METRIC}\s+(?:of|for|on|at)\s+(?:the\s+)?{MACHINE}(?:\s+{time})?"
            ),
        ),
        PatternRule::new(
            "machine_possessive_metric",
            IntentKind::MetricQuery,
            &format!(
                r"(?:(?:what(?:'s|\s+is|\s+was)|show(?:\s+me)?)\s+)?(?:the\s+)?(?P<machine>[\w-]+(?:\s[\w-]+)?)'s\s+{METRIC}(?:\s+{time})?"
            ),
        ),
        PatternRule::new(
            "ranking_top_n",
            IntentKind::RankingQuery,
            &format!(
                r"(?:(?:show|list|give|tell)\s+(?:me\s+)?)?(?:the\s+)?(?:top|biggest|highest|largest)\s+{LIMIT}(?:\s+{METRIC})?(?:\s+(?:consumers?|users?|machines?|assets?))?(?:\s+{time})?"
            ),
        ),
        PatternRule::new(
            "status_of_machine",
            IntentKind::StatusQuery,
            &format!(
                r"(?:what(?:'s|\s+is)\s+)?(?:the\s+)?(?:current\s+)?(?:status|state|condition)\s+(?:of|for)\s+(?:the\s+)?{MACHINE}(?:\s+(?:right\s+now|now|currently))?"
            ),
        ),
        PatternRule::new(
            "machine_status",
            IntentKind::StatusQuery,
            r"(?:(?:what(?:'s|\s+is)|show(?:\s+me)?)\s+)?(?:the\s+)?(?P<machine>[\w-]+(?:\s[\w-]+)??)(?:'s)?\s+status",
        ),
        PatternRule::new(
            "plant_overview",
            IntentKind::OverviewQuery,
            r"how(?:'s|\s+is|\s+are)\s+(?:the\s+)?(?:plant|factory|facility|site|everything|things)(?:\s+(?:doing|running|looking))?",
        ),
        PatternRule::new(
            "how_is_machine",
            IntentKind::StatusQuery,
            &format!(
                r"how(?:'s|\s+is)\s+(?:the\s+)?{MACHINE}\s+(?:doing|running|performing)"
            ),
        ),
        // ── Bare keyword forms ──────────────────────────────────────
        PatternRule::new(
            "overview",
            IntentKind::OverviewQuery,
            &format!(
                r"(?:(?:give|show)\s+me\s+)?(?:an?\s+|the\s+)?(?:(?:plant|factory|facility|site)\s+)?(?:overview|summary)(?:\s+{time})?"
            ),
        ),
        PatternRule::new(
            "ranking_bare",
            IntentKind::RankingQuery,
            &format!(
                r"(?:(?:who|what)\s+are\s+|show\s+(?:me\s+)?)?(?:the\s+)?(?:top|biggest|highest)\s+(?:{METRIC}\s+)?(?:consumers?|users?)(?:\s+{time})?"
            ),
        ),
        PatternRule::new(
            "compare_bare",
            IntentKind::ComparisonQuery,
            &format!(r"(?:please\s+)?compare(?:\s+(?:the\s+)?{MACHINE})?"),
        ),
    ]
});

/// Ordered pattern → intent router.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternRouter;

impl PatternRouter {
    pub fn new() -> Self {
        Self
    }

    /// Number of rules, in priority order.
    pub fn rule_count(&self) -> usize {
        RULES.len()
    }

    /// First matching rule's candidate, or `None`.
    pub fn route(&self, text: &str) -> Option<IntentCandidate> {
        let text = text.trim().trim_end_matches(['?', '.', '!']).trim_end();
        if text.is_empty() {
            return None;
        }

        RULES.iter().find_map(|rule| {
            let caps = rule.regex.captures(text)?;
            let mut entities = BTreeMap::new();
            for role in EntityRole::ALL {
                if let Some(m) = caps.name(role.as_str()) {
                    let value = m.as_str().trim();
                    if !value.is_empty() {
                        entities.insert(role, value.to_string());
                    }
                }
            }
            tracing::debug!(rule = rule.name, intent = %rule.intent, "pattern rule matched");
            Some(IntentCandidate::new(
                rule.intent.as_str(),
                entities,
                PATTERN_CONFIDENCE,
                SourceTier::Pattern,
            ))
        })
    }
}
