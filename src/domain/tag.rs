// Tag domain model and value normalization
use super::error::ChartError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display scale upper bound; display values live in `[0, DISPLAY_SCALE]`
pub const DISPLAY_SCALE: f64 = 100.0;

/// Fallback colours, assigned by position in the selection
pub const TAG_PALETTE: [&str; 5] = ["#3B82F6", "#F97316", "#10B981", "#EF4444", "#8B5CF6"];

/// Descriptor of one monitored signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub tag_id: String,
    pub tag_label: String,
    pub unit: String,
    pub min_range: f64,
    pub max_range: f64,
    pub color: Option<String>,
}

impl Tag {
    pub fn new(
        tag_id: impl Into<String>,
        tag_label: impl Into<String>,
        unit: impl Into<String>,
        min_range: f64,
        max_range: f64,
        color: Option<String>,
    ) -> Self {
        Self {
            tag_id: tag_id.into(),
            tag_label: tag_label.into(),
            unit: unit.into(),
            min_range,
            max_range,
            color,
        }
    }

    /// A degenerate range (`min == max`) is accepted; inverted or non-finite ones are not
    pub fn validate(&self) -> Result<(), ChartError> {
        if !self.min_range.is_finite()
            || !self.max_range.is_finite()
            || self.min_range > self.max_range
        {
            return Err(ChartError::InvalidTagRange {
                tag_id: self.tag_id.clone(),
                min: self.min_range,
                max: self.max_range,
            });
        }
        Ok(())
    }

    pub fn normalize(&self, raw_value: f64) -> f64 {
        normalize_value(raw_value, self.min_range, self.max_range)
    }

    pub fn denormalize(&self, display_value: f64) -> f64 {
        denormalize_value(display_value, self.min_range, self.max_range)
    }
}

/// Rescale a raw reading into the 0-100 display scale, clamped.
/// A degenerate range maps every value to 0.
pub fn normalize_value(raw_value: f64, min_range: f64, max_range: f64) -> f64 {
    if max_range == min_range {
        return 0.0;
    }
    let scaled = (raw_value - min_range) / (max_range - min_range) * DISPLAY_SCALE;
    scaled.clamp(0.0, DISPLAY_SCALE)
}

/// Inverse of [`normalize_value`] for values inside the tag range
pub fn denormalize_value(display_value: f64, min_range: f64, max_range: f64) -> f64 {
    display_value / DISPLAY_SCALE * (max_range - min_range) + min_range
}

/// The set of known tags, in the order the backend returned them
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: Vec<Tag>,
    index: HashMap<String, usize>,
}

impl TagRegistry {
    /// Build a registry, dropping tags with invalid ranges or duplicate ids
    pub fn from_tags(tags: Vec<Tag>) -> Self {
        let mut registry = Self::default();
        for tag in tags {
            if let Err(e) = tag.validate() {
                tracing::warn!("Dropping tag: {}", e);
                continue;
            }
            if registry.index.contains_key(&tag.tag_id) {
                tracing::warn!("Dropping duplicate tag {}", tag.tag_id);
                continue;
            }
            registry.index.insert(tag.tag_id.clone(), registry.tags.len());
            registry.tags.push(tag);
        }
        registry
    }

    pub fn get(&self, tag_id: &str) -> Option<&Tag> {
        self.index.get(tag_id).map(|&i| &self.tags[i])
    }

    pub fn contains(&self, tag_id: &str) -> bool {
        self.index.contains_key(tag_id)
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Colour for the tag at `position` in the current selection
    pub fn color_for(&self, tag_id: &str, position: usize) -> String {
        self.get(tag_id)
            .and_then(|t| t.color.clone())
            .unwrap_or_else(|| TAG_PALETTE[position % TAG_PALETTE.len()].to_string())
    }
}
