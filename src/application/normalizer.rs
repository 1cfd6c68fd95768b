// Time-series normalizer - raw samples to dense per-timestamp rows
use crate::domain::tag::TagRegistry;
use crate::domain::telemetry::{NormalizedRow, Sample};
use std::collections::{BTreeMap, HashSet};

/// Group samples of the selected tags into rows sorted by timestamp.
///
/// Samples for unknown tags or with non-finite values are dropped. When the same
/// tag has several samples at one timestamp, the last one in input order wins.
pub fn normalize_samples(
    samples: &[Sample],
    registry: &TagRegistry,
    selected_tags: &[String],
) -> Vec<NormalizedRow> {
    let selected: HashSet<&str> = selected_tags.iter().map(String::as_str).collect();
    let mut rows: BTreeMap<i64, NormalizedRow> = BTreeMap::new();
    let mut dropped = 0usize;

    for sample in samples {
        if !selected.contains(sample.tag_id.as_str()) {
            continue;
        }
        let Some(tag) = registry.get(&sample.tag_id) else {
            dropped += 1;
            continue;
        };
        if !sample.raw_value.is_finite() {
            dropped += 1;
            continue;
        }

        rows.entry(sample.timestamp_ms)
            .or_insert_with(|| NormalizedRow::new(sample.timestamp_ms))
            .values
            .insert(sample.tag_id.clone(), tag.normalize(sample.raw_value));
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} samples with unknown tags or bad values", dropped);
    }

    rows.into_values().collect()
}
