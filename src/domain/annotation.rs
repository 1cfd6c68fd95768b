// Annotation domain models
use super::error::ChartError;
use super::telemetry::TimestampMs;
use serde::{Deserialize, Serialize};

/// Overlay colour of committed regions
pub const REGION_COLOR: &str = "#EF4444";

/// Min/max actual value of one tag inside a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub tag_id: String,
    pub tag_label: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
}

/// Annotation resolved from a gesture, waiting for the user's details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AnnotationDraft {
    #[serde(rename_all = "camelCase")]
    Point {
        tag_id: String,
        timestamp_ms: TimestampMs,
        raw_value: f64,
        display_value: f64,
    },
    #[serde(rename_all = "camelCase")]
    Region {
        tag_id: String,
        region_start: TimestampMs,
        region_end: TimestampMs,
        value_ranges: Vec<ValueRange>,
    },
}

impl AnnotationDraft {
    pub fn tag_id(&self) -> &str {
        match self {
            Self::Point { tag_id, .. } | Self::Region { tag_id, .. } => tag_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point { .. } => "point",
            Self::Region { .. } => "region",
        }
    }

    /// First and last timestamp covered; a point covers one instant
    pub fn span(&self) -> (TimestampMs, TimestampMs) {
        match self {
            Self::Point { timestamp_ms, .. } => (*timestamp_ms, *timestamp_ms),
            Self::Region {
                region_start,
                region_end,
                ..
            } => (*region_start, *region_end),
        }
    }

    /// Region length in whole minutes, rounded; points have none
    pub fn duration_minutes(&self) -> Option<i64> {
        match self {
            Self::Point { .. } => None,
            Self::Region {
                region_start,
                region_end,
                ..
            } => Some(((region_end - region_start) as f64 / 60_000.0).round() as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Good,
    Bad,
    Fault,
    Anomaly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl Severity {
    /// Overlay colour of committed point markers
    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "#EF4444",
            Self::Medium => "#F59E0B",
            Self::Low => "#10B981",
        }
    }
}

/// What the user enters when confirming a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDetails {
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub severity: Severity,
}

impl AnnotationDetails {
    /// Trim the description and reject it when blank
    pub fn validated(self) -> Result<Self, ChartError> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(ChartError::EmptyDescription);
        }
        Ok(Self {
            description,
            ..self
        })
    }
}

/// A committed annotation as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: i64,
    #[serde(flatten)]
    pub draft: AnnotationDraft,
    #[serde(flatten)]
    pub details: AnnotationDetails,
}
