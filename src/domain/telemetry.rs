// Telemetry data domain models
use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use std::collections::BTreeMap;

/// Milliseconds since the Unix epoch
pub type TimestampMs = i64;

/// RFC 3339 UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`
pub fn format_timestamp(timestamp_ms: TimestampMs) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// One raw reading of a tag
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp_ms: TimestampMs,
    pub tag_id: String,
    pub raw_value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: TimestampMs, tag_id: impl Into<String>, raw_value: f64) -> Self {
        Self {
            timestamp_ms,
            tag_id: tag_id.into(),
            raw_value,
        }
    }
}

/// All display values sharing one timestamp.
/// Tags without a sample at this instant have no entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub timestamp_ms: TimestampMs,
    pub values: BTreeMap<String, f64>,
}

impl NormalizedRow {
    pub fn new(timestamp_ms: TimestampMs) -> Self {
        Self {
            timestamp_ms,
            values: BTreeMap::new(),
        }
    }

    pub fn value(&self, tag_id: &str) -> Option<f64> {
        self.values.get(tag_id).copied()
    }
}

/// Closed time interval in (possibly fractional) milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Span of the given rows, `None` when empty. Rows must be sorted.
    pub fn of_rows(rows: &[NormalizedRow]) -> Option<Self> {
        let first = rows.first()?;
        let last = rows.last()?;
        Some(Self::new(first.timestamp_ms as f64, last.timestamp_ms as f64))
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn contains(&self, timestamp_ms: TimestampMs) -> bool {
        let t = timestamp_ms as f64;
        t >= self.start && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_of_rows() {
        assert_eq!(TimeRange::of_rows(&[]), None);

        let rows = vec![NormalizedRow::new(10), NormalizedRow::new(40)];
        let range = TimeRange::of_rows(&rows).unwrap();
        assert_eq!(range, TimeRange::new(10.0, 40.0));
        assert_eq!(range.span(), 30.0);
        assert_eq!(range.center(), 25.0);
        assert!(range.contains(10) && range.contains(40));
        assert!(!range.contains(41));
    }
}
