// Upstream JSON shapes and their lenient conversion to domain types
use crate::domain::annotation::{Annotation, AnnotationDetails, AnnotationDraft, Category, Severity};
use crate::domain::tag::Tag;
use crate::domain::telemetry::{format_timestamp, Sample, TimestampMs};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTag {
    tag_id: String,
    #[serde(default)]
    tag_label: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    min_range: f64,
    max_range: f64,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSample {
    timestamp: Value,
    tag_id: String,
    #[serde(default)]
    value: Value,
}

/// Decode tags one by one so that a malformed entry only loses itself
pub fn tags_from_wire(items: Vec<Value>) -> Vec<Tag> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WireTag>(item) {
            Ok(t) => {
                let tag_label = t.tag_label.unwrap_or_else(|| t.tag_id.clone());
                Some(Tag::new(
                    t.tag_id,
                    tag_label,
                    t.unit.unwrap_or_default(),
                    t.min_range,
                    t.max_range,
                    t.color,
                ))
            }
            Err(e) => {
                tracing::warn!("Dropping malformed tag: {}", e);
                None
            }
        })
        .collect()
}

/// Decode samples, silently skipping unparseable timestamps, values or shapes
pub fn samples_from_wire(items: Vec<Value>) -> Vec<Sample> {
    let total = items.len();
    let samples: Vec<Sample> = items
        .into_iter()
        .filter_map(|item| {
            let wire: WireSample = serde_json::from_value(item).ok()?;
            Some(Sample::new(
                parse_timestamp(&wire.timestamp)?,
                wire.tag_id,
                parse_number(&wire.value)?,
            ))
        })
        .collect();

    if samples.len() < total {
        tracing::debug!("Dropped {} malformed samples of {}", total - samples.len(), total);
    }
    samples
}

/// Epoch milliseconds, RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` taken as UTC
fn parse_timestamp(value: &Value) -> Option<TimestampMs> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.timestamp_millis())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map(|t| t.and_utc().timestamp_millis())
            })
            .ok(),
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Body of the annotation commit request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    pub tag_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
    pub timestamp: Option<String>,
    pub value: f64,
    pub normalized_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_end: Option<String>,
}

impl AnnotationRequest {
    pub fn new(draft: &AnnotationDraft, details: &AnnotationDetails) -> Self {
        let base = |timestamp, value, normalized_value, region_start, region_end| Self {
            tag_id: draft.tag_id().to_string(),
            kind: draft.kind(),
            category: details.category,
            severity: details.severity,
            description: details.description.clone(),
            timestamp,
            value,
            normalized_value,
            region_start,
            region_end,
        };
        match draft {
            AnnotationDraft::Point {
                timestamp_ms,
                raw_value,
                display_value,
                ..
            } => base(format_timestamp(*timestamp_ms), *raw_value, *display_value, None, None),
            AnnotationDraft::Region {
                region_start,
                region_end,
                ..
            } => {
                let start = format_timestamp(*region_start);
                base(start.clone(), 0.0, 0.0, start, format_timestamp(*region_end))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotationResponse {
    id: i64,
}

/// Combine the backend's response with what was sent; only the identity comes back
pub fn annotation_from_wire(
    response: Value,
    draft: &AnnotationDraft,
    details: &AnnotationDetails,
) -> anyhow::Result<Annotation> {
    let AnnotationResponse { id } = serde_json::from_value(response)?;
    Ok(Annotation {
        id,
        draft: draft.clone(),
        details: details.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_samples_accept_mixed_timestamp_and_value_formats() {
        let samples = samples_from_wire(vec![
            json!({"timestamp": "2024-03-01T10:00:00Z", "tagId": "T1", "value": 12.5, "unit": "bar"}),
            json!({"timestamp": 1_709_287_200_500_i64, "tagId": "T1", "value": "13.25"}),
            json!({"timestamp": "2024-03-01 10:00:01", "tagId": "T2", "value": 1}),
        ]);
        assert_eq!(
            samples,
            vec![
                Sample::new(1_709_287_200_000, "T1", 12.5),
                Sample::new(1_709_287_200_500, "T1", 13.25),
                Sample::new(1_709_287_201_000, "T2", 1.0),
            ]
        );
    }

    #[test]
    fn test_malformed_samples_are_dropped() {
        let samples = samples_from_wire(vec![
            json!({"timestamp": "yesterday", "tagId": "T1", "value": 1}),
            json!({"timestamp": 0, "tagId": "T1", "value": "n/a"}),
            json!({"timestamp": 0, "value": 1}),
            json!({"timestamp": 0, "tagId": "T1"}),
            json!("not an object"),
            json!({"timestamp": 5, "tagId": "T1", "value": 2}),
        ]);
        assert_eq!(samples, vec![Sample::new(5, "T1", 2.0)]);
    }

    #[test]
    fn test_tags_fill_optional_fields() {
        let tags = tags_from_wire(vec![
            json!({"tagId": "T1", "tagLabel": "Flow", "unit": "m3/h", "minRange": 0, "maxRange": 50, "color": "#fff"}),
            json!({"tagId": "T2", "minRange": 1, "maxRange": 2}),
            json!({"tagId": "T3", "minRange": "low"}),
        ]);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], Tag::new("T1", "Flow", "m3/h", 0.0, 50.0, Some("#fff".to_string())));
        assert_eq!(tags[1], Tag::new("T2", "T2", "", 1.0, 2.0, None));
    }

    #[test]
    fn test_region_request_shape() {
        let draft = AnnotationDraft::Region {
            tag_id: "T1".to_string(),
            region_start: 0,
            region_end: 60_000,
            value_ranges: vec![],
        };
        let details = AnnotationDetails {
            description: "startup transient".to_string(),
            category: Category::Anomaly,
            severity: Severity::Medium,
        };
        let body = serde_json::to_value(AnnotationRequest::new(&draft, &details)).unwrap();
        assert_eq!(body["type"], "region");
        assert_eq!(body["category"], "Anomaly");
        assert_eq!(body["regionStart"], "1970-01-01T00:00:00.000Z");
        assert_eq!(body["regionEnd"], "1970-01-01T00:01:00.000Z");
        assert_eq!(body["timestamp"], body["regionStart"]);

        let stored = annotation_from_wire(json!({"id": 7, "tagId": "T1"}), &draft, &details).unwrap();
        assert_eq!(stored.id, 7);
        assert_eq!(stored.draft, draft);
    }
}
