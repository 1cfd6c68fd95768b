// Annotation capture - classifies pointer gestures over the chart into drafts
//
// Idle -> Arming on pointer-down. Moving further than DRAG_THRESHOLD_PX horizontally
// turns the gesture into a region drag; releasing before that is a point click.
// Leaving the chart surface aborts the gesture without emitting anything.
use crate::domain::annotation::{AnnotationDraft, ValueRange};
use crate::domain::chart::{pixel_to_timestamp, value_to_pixel_y, ChartGeometry, PointerPos};
use crate::domain::tag::TagRegistry;
use crate::domain::telemetry::{NormalizedRow, TimeRange};
use serde::Deserialize;

/// Horizontal distance separating a click from a region drag
pub const DRAG_THRESHOLD_PX: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Arming { anchor: PointerPos },
    Dragging { anchor: PointerPos, current: PointerPos },
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Arming { .. } => "arming",
            Self::Dragging { .. } => "dragging",
        }
    }
}

/// What is on screen when a gesture resolves
#[derive(Debug, Clone, Copy)]
pub struct ChartFrame<'a> {
    /// Visible rows, sorted by timestamp
    pub rows: &'a [NormalizedRow],
    /// Time range mapped onto the plot width
    pub range: Option<TimeRange>,
    pub selected_tags: &'a [String],
    pub registry: &'a TagRegistry,
    pub geometry: &'a ChartGeometry,
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationCapture {
    state: CaptureState,
}

impl AnnotationCapture {
    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn handle(&mut self, event: PointerEvent, frame: &ChartFrame<'_>) -> Option<AnnotationDraft> {
        match event {
            PointerEvent::Down { x, y } => {
                self.pointer_down(PointerPos::new(x, y));
                None
            }
            PointerEvent::Move { x, y } => {
                self.pointer_move(PointerPos::new(x, y));
                None
            }
            PointerEvent::Up { x, y } => self.pointer_up(PointerPos::new(x, y), frame),
            PointerEvent::Leave => {
                self.cancel();
                None
            }
        }
    }

    pub fn pointer_down(&mut self, pos: PointerPos) {
        self.state = CaptureState::Arming { anchor: pos };
    }

    pub fn pointer_move(&mut self, pos: PointerPos) {
        self.state = match self.state {
            CaptureState::Idle => CaptureState::Idle,
            CaptureState::Arming { anchor } if exceeds_threshold(anchor, pos) => {
                CaptureState::Dragging {
                    anchor,
                    current: pos,
                }
            }
            arming @ CaptureState::Arming { .. } => arming,
            CaptureState::Dragging { anchor, .. } => CaptureState::Dragging {
                anchor,
                current: pos,
            },
        };
    }

    /// Finish the gesture. Returns `None` when idle or when nothing is under the gesture.
    pub fn pointer_up(&mut self, pos: PointerPos, frame: &ChartFrame<'_>) -> Option<AnnotationDraft> {
        let state = std::mem::take(&mut self.state);
        match state {
            CaptureState::Idle => None,
            CaptureState::Arming { anchor } if exceeds_threshold(anchor, pos) => {
                resolve_region(anchor, pos, frame)
            }
            CaptureState::Arming { .. } => resolve_point(pos, frame),
            CaptureState::Dragging { anchor, .. } => resolve_region(anchor, pos, frame),
        }
    }

    pub fn cancel(&mut self) {
        self.state = CaptureState::Idle;
    }
}

fn exceeds_threshold(anchor: PointerPos, pos: PointerPos) -> bool {
    (pos.x - anchor.x).abs() > DRAG_THRESHOLD_PX
}

fn resolve_region(
    anchor: PointerPos,
    end: PointerPos,
    frame: &ChartFrame<'_>,
) -> Option<AnnotationDraft> {
    let range = frame.range?;
    let start_ms = pixel_to_timestamp(anchor.x.min(end.x), range, frame.geometry).round() as i64;
    let end_ms = pixel_to_timestamp(anchor.x.max(end.x), range, frame.geometry).round() as i64;
    let region = TimeRange::new(start_ms as f64, end_ms as f64);

    let in_region: Vec<&NormalizedRow> = frame
        .rows
        .iter()
        .filter(|r| region.contains(r.timestamp_ms))
        .collect();

    let value_ranges: Vec<ValueRange> = frame
        .selected_tags
        .iter()
        .filter_map(|tag_id| {
            let tag = frame.registry.get(tag_id)?;
            let (min, max) = in_region
                .iter()
                .filter_map(|r| r.value(tag_id))
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })?;
            Some(ValueRange {
                tag_id: tag_id.clone(),
                tag_label: tag.tag_label.clone(),
                unit: tag.unit.clone(),
                min: tag.denormalize(min),
                max: tag.denormalize(max),
            })
        })
        .collect();

    let Some(first) = value_ranges.first() else {
        tracing::debug!("Region [{}, {}] has no data, nothing to annotate", start_ms, end_ms);
        return None;
    };

    Some(AnnotationDraft::Region {
        tag_id: first.tag_id.clone(),
        region_start: start_ms,
        region_end: end_ms,
        value_ranges,
    })
}

fn resolve_point(pos: PointerPos, frame: &ChartFrame<'_>) -> Option<AnnotationDraft> {
    let range = frame.range?;
    let row = nearest_row(frame.rows, pixel_to_timestamp(pos.x, range, frame.geometry))?;

    // Nearest line in pixel space; strict comparison keeps selection order on ties
    let mut closest: Option<(&String, f64, f64)> = None;
    for tag_id in frame.selected_tags {
        let Some(value) = row.value(tag_id) else {
            continue;
        };
        if !frame.registry.contains(tag_id) {
            continue;
        }
        let distance = (value_to_pixel_y(value, frame.geometry) - pos.y).abs();
        if closest.is_none_or(|(_, _, best)| distance < best) {
            closest = Some((tag_id, value, distance));
        }
    }

    let (tag_id, display_value, _) = closest?;
    let tag = frame.registry.get(tag_id)?;
    Some(AnnotationDraft::Point {
        tag_id: tag_id.clone(),
        timestamp_ms: row.timestamp_ms,
        raw_value: tag.denormalize(display_value),
        display_value,
    })
}

/// Row closest in time to `timestamp_ms`; the earlier row wins a tie
fn nearest_row(rows: &[NormalizedRow], timestamp_ms: f64) -> Option<&NormalizedRow> {
    let idx = rows.partition_point(|r| (r.timestamp_ms as f64) < timestamp_ms);
    let after = rows.get(idx);
    let before = idx.checked_sub(1).and_then(|i| rows.get(i));
    match (before, after) {
        (Some(b), Some(a)) => {
            let db = timestamp_ms - b.timestamp_ms as f64;
            let da = a.timestamp_ms as f64 - timestamp_ms;
            Some(if db <= da { b } else { a })
        }
        (b, a) => b.or(a),
    }
}
