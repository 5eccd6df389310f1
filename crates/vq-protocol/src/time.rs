use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolved absolute time window. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    /// The expression the range was parsed from, as the user said it.
    label: String,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    label: String,
}

/// Returned when constructing a range whose start lies after its end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("time range start {start} is after end {end}")]
pub struct InvertedRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        label: impl Into<String>,
    ) -> Result<Self, InvertedRange> {
        if start > end {
            return Err(InvertedRange { start, end });
        }
        Ok(Self {
            start,
            end,
            label: label.into(),
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = InvertedRange;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        TimeRange::new(raw.start, raw.end, raw.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_inverted_bounds() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        assert!(TimeRange::new(a, b, "x").is_ok());
        assert!(TimeRange::new(b, a, "x").is_err());
        assert!(TimeRange::new(a, a, "x").is_ok());
    }

    #[test]
    fn deserialize_enforces_ordering() {
        let json = r#"{"start":"2025-03-02T00:00:00Z","end":"2025-03-01T00:00:00Z","label":"x"}"#;
        assert!(serde_json::from_str::<TimeRange>(json).is_err());

        let json = r#"{"start":"2025-03-01T00:00:00Z","end":"2025-03-02T00:00:00Z","label":"yesterday"}"#;
        let range: TimeRange = serde_json::from_str(json).unwrap();
        assert_eq!(range.label(), "yesterday");
        assert_eq!(range.duration(), chrono::Duration::hours(24));
    }
}
