//! Time expression parsing: relative vocabulary and absolute ranges.
//!
//! Every expression resolves to an absolute `[start, end]` pair against the
//! clock's "now". Calendar boundaries (midnight, Monday, first of month) are
//! computed in a fixed UTC offset.

use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Utc,
};
use regex::Regex;
use vq_protocol::TimeRange;

use crate::error::TimeRangeError;

/// Data older than this is gone; ranges starting before it are refused.
pub const RETENTION_DAYS: i64 = 365;

/// Human-readable list used in clarification prompts.
pub const ACCEPTED_FORMATS: &str = "'today', 'yesterday', 'last 24 hours', 'last week', \
'this month', or two dates like '2025-01-01 to 2025-01-07'";

static RE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<lead>(?:the\s+)?(?:last|past))\s+)?(?P<n>\d+)?\s*(?P<unit>minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|wks?|w)$",
    )
    .unwrap()
});

static RE_ABSOLUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:from\s+|between\s+)?(?P<a>.+?)\s+(?:to|until|and|-)\s+(?P<b>.+)$")
        .unwrap()
});

/// Source of "now".
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Converts time expressions into absolute ranges.
#[derive(Debug, Clone)]
pub struct TimeRangeParser {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl TimeRangeParser {
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    /// Parser on the system clock with midnights in UTC.
    pub fn utc() -> Self {
        Self::new(Arc::new(SystemClock), Utc.fix())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolve `expression` against the clock's current instant.
    pub fn parse(&self, expression: &str) -> Result<TimeRange, TimeRangeError> {
        self.parse_at(expression, self.clock.now())
    }

    /// Resolve `expression` against an explicit `now`.
    pub fn parse_at(
        &self,
        expression: &str,
        now: DateTime<Utc>,
    ) -> Result<TimeRange, TimeRangeError> {
        let label = expression.trim().trim_end_matches(['?', '.', '!']).trim_end();
        let lower = label.to_lowercase();

        let (start, end) = match self.relative(&lower, now)? {
            Some(bounds) => bounds,
            None => self.absolute(label)?,
        };
        self.checked(start, end, now, label)
    }

    fn relative(
        &self,
        expr: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, TimeRangeError> {
        let today = self.midnight(now.with_timezone(&self.offset).date_naive());
        let bounds = match expr {
            "today" => (today, now),
            "yesterday" => (today - Duration::days(1), today),
            "this week" => {
                let local = now.with_timezone(&self.offset).date_naive();
                let monday =
                    local - Duration::days(i64::from(local.weekday().num_days_from_monday()));
                (self.midnight(monday), now)
            }
            "last week" | "past week" | "the last week" | "the past week" => {
                (now - Duration::days(7), now)
            }
            "this month" => (self.midnight(first_of_month(now, self.offset)), now),
            "last month" => {
                let this_month = first_of_month(now, self.offset);
                let prev = this_month
                    .checked_sub_months(Months::new(1))
                    .ok_or_else(|| TimeRangeError::Unrecognized(expr.to_string()))?;
                (self.midnight(prev), self.midnight(this_month))
            }
            _ => match duration_of(expr)? {
                Some(span) => (now - span, now),
                None => return Ok(None),
            },
        };
        Ok(Some(bounds))
    }

    fn absolute(&self, expr: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), TimeRangeError> {
        let (a, b) = if let Some(caps) = RE_ABSOLUTE.captures(expr) {
            (caps["a"].to_string(), caps["b"].to_string())
        } else if let Some((a, b)) = expr.split_once('/') {
            (a.to_string(), b.to_string())
        } else {
            return Err(TimeRangeError::Unrecognized(expr.to_string()));
        };

        let start = self.timestamp(a.trim(), Bound::Start)?;
        let end = self.timestamp(b.trim(), Bound::End)?;
        if start > end {
            return Err(TimeRangeError::StartAfterEnd);
        }
        Ok((start, end))
    }

    fn timestamp(&self, text: &str, bound: Bound) -> Result<DateTime<Utc>, TimeRangeError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&Utc));
        }
        for format in [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return self.localize(naive, text);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            // A bare end date covers that whole day.
            let date = match bound {
                Bound::Start => date,
                Bound::End => date
                    .succ_opt()
                    .ok_or_else(|| TimeRangeError::InvalidTimestamp(text.to_string()))?,
            };
            return Ok(self.midnight(date));
        }
        Err(TimeRangeError::InvalidTimestamp(text.to_string()))
    }

    /// Enforce ordering, clamp a future end to now, apply retention.
    fn checked(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
        label: &str,
    ) -> Result<TimeRange, TimeRangeError> {
        if start > now {
            return Err(TimeRangeError::StartInFuture);
        }
        if start < now - Duration::days(RETENTION_DAYS) {
            return Err(TimeRangeError::BeyondRetention {
                days: RETENTION_DAYS,
            });
        }
        let end = end.min(now);
        TimeRange::new(start, end, label).map_err(|_| TimeRangeError::StartAfterEnd)
    }

    fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        // Fixed offsets have no gaps or folds.
        (naive - self.offset_duration()).and_utc()
    }

    fn localize(&self, naive: NaiveDateTime, text: &str) -> Result<DateTime<Utc>, TimeRangeError> {
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| TimeRangeError::InvalidTimestamp(text.to_string()))
    }

    fn offset_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn first_of_month(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    let local = now.with_timezone(&offset).date_naive();
    local.with_day(1).unwrap_or(local)
}

/// `"24h"`, `"last 7 days"`, `"past hour"` → span. `Ok(None)` if the
/// expression is not a duration form at all.
fn duration_of(expr: &str) -> Result<Option<Duration>, TimeRangeError> {
    let Some(caps) = RE_DURATION.captures(expr) else {
        return Ok(None);
    };
    let has_lead = caps.name("lead").is_some();
    let n = match caps.name("n") {
        Some(m) => m
            .as_str()
            .parse::<i64>()
            .map_err(|_| TimeRangeError::Unrecognized(expr.to_string()))?,
        None if has_lead => 1,
        None => return Ok(None),
    };
    if n == 0 {
        return Err(TimeRangeError::Unrecognized(expr.to_string()));
    }

    let unit = &caps["unit"];
    let span = match unit.chars().next() {
        Some('m') => Duration::try_minutes(n),
        Some('h') => Duration::try_hours(n),
        Some('d') => Duration::try_days(n),
        Some('w') => Duration::try_weeks(n),
        _ => None,
    };
    match span {
        Some(span) if span <= Duration::days(RETENTION_DAYS) => Ok(Some(span)),
        _ => Err(TimeRangeError::BeyondRetention {
            days: RETENTION_DAYS,
        }),
    }
}
