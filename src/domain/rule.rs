// Threshold rules evaluated against normalized chart rows
use super::annotation::Severity;
use super::telemetry::{NormalizedRow, TimestampMs};
use serde::{Deserialize, Serialize};

/// Tolerance, in display units, for the equality condition
const EQUALITY_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RuleCondition {
    #[serde(rename = ">", alias = "greater_than")]
    GreaterThan,
    #[serde(rename = "<", alias = "less_than")]
    LessThan,
    #[serde(rename = "=", alias = "equal_to")]
    EqualTo,
    #[serde(rename = "between")]
    Between,
}

/// Threshold rule on a tag's display value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: i64,
    pub tag_id: String,
    pub condition: RuleCondition,
    pub threshold: f64,
    #[serde(default)]
    pub threshold_max: Option<f64>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Rule {
    pub fn is_violated_by(&self, value: f64) -> bool {
        match self.condition {
            RuleCondition::GreaterThan => value > self.threshold,
            RuleCondition::LessThan => value < self.threshold,
            RuleCondition::EqualTo => (value - self.threshold).abs() < EQUALITY_TOLERANCE,
            RuleCondition::Between => {
                value >= self.threshold && value <= self.threshold_max.unwrap_or(self.threshold)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: i64,
    pub tag_id: String,
    pub timestamp_ms: TimestampMs,
    pub value: f64,
    pub severity: Severity,
    pub condition: RuleCondition,
    pub threshold: f64,
}

/// Every (row, rule) pair where an active rule for `tag_id` fires
pub fn detect_violations(rows: &[NormalizedRow], rules: &[Rule], tag_id: &str) -> Vec<Violation> {
    let active: Vec<&Rule> = rules
        .iter()
        .filter(|r| r.is_active && r.tag_id == tag_id)
        .collect();

    rows.iter()
        .filter_map(|row| row.value(tag_id).map(|v| (row.timestamp_ms, v)))
        .flat_map(|(timestamp_ms, value)| {
            active
                .iter()
                .filter(move |rule| rule.is_violated_by(value))
                .map(move |rule| Violation {
                    rule_id: rule.id,
                    tag_id: tag_id.to_string(),
                    timestamp_ms,
                    value,
                    severity: rule.severity,
                    condition: rule.condition,
                    threshold: rule.threshold,
                })
        })
        .collect()
}
