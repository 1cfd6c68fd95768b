// Chart session - one user's selection, loaded data, zoom and gesture state
use crate::application::annotation_capture::{AnnotationCapture, ChartFrame, PointerEvent};
use crate::application::normalizer::normalize_samples;
use crate::application::time_window::TimeWindow;
use crate::application::viewport::{ZoomCommand, ZoomController};
use crate::domain::annotation::{Annotation, AnnotationDraft, REGION_COLOR};
use crate::domain::chart::{timestamp_to_pixel, value_to_pixel_y, ChartGeometry, Viewport};
use crate::domain::error::ChartError;
use crate::domain::tag::TagRegistry;
use crate::domain::telemetry::{NormalizedRow, Sample, TimeRange};
use serde::Serialize;

/// Sample fetch issued for one generation of a session's selection
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub generation: u64,
    pub tag_ids: Vec<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchOutcome {
    Applied { samples: usize },
    Failed,
    /// The selection changed while the fetch was in flight
    Stale,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub tag_id: String,
    pub tag_label: String,
    pub unit: String,
    pub color: String,
}

/// Committed annotation positioned on the plot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationMarker {
    pub id: i64,
    pub kind: &'static str,
    pub tag_id: String,
    pub x_start: f64,
    pub x_end: f64,
    /// Points only
    pub y: Option<f64>,
    pub color: &'static str,
}

/// Everything a client needs to draw the chart
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub selected_tags: Vec<String>,
    pub time_window: TimeWindow,
    pub rows: Vec<NormalizedRow>,
    pub viewport: Option<Viewport>,
    pub data_range: Option<TimeRange>,
    pub legend: Vec<LegendEntry>,
    pub loading: bool,
    pub notice: Option<String>,
    pub capture_state: &'static str,
    pub pending_draft: Option<AnnotationDraft>,
    pub annotations: Vec<AnnotationMarker>,
}

/// Normalized, windowed rows plus the range they span
struct Prepared {
    windowed: Vec<NormalizedRow>,
    data_range: Option<TimeRange>,
}

#[derive(Debug, Clone)]
pub struct ChartSession {
    selected_tags: Vec<String>,
    window: TimeWindow,
    samples: Vec<Sample>,
    generation: u64,
    loading: bool,
    notice: Option<String>,
    zoom: ZoomController,
    capture: AnnotationCapture,
    pending: Option<AnnotationDraft>,
    annotations: Vec<Annotation>,
}

impl ChartSession {
    pub fn new(selected_tags: Vec<String>, window: TimeWindow) -> Self {
        Self {
            selected_tags,
            window,
            samples: Vec::new(),
            generation: 0,
            loading: false,
            notice: None,
            zoom: ZoomController::default(),
            capture: AnnotationCapture::default(),
            pending: None,
            annotations: Vec::new(),
        }
    }

    pub fn selected_tags(&self) -> &[String] {
        &self.selected_tags
    }

    /// Change the selection and/or window. Any in-flight fetch becomes stale and the
    /// viewport, gesture and pending draft are discarded along with the old data.
    /// Returns the fetch to perform, or `None` when nothing is selected.
    pub fn select(&mut self, tag_ids: Vec<String>, window: Option<TimeWindow>) -> Option<FetchTicket> {
        self.generation += 1;
        if tag_ids != self.selected_tags {
            self.annotations.clear();
        }
        self.selected_tags = tag_ids;
        if let Some(window) = window {
            self.window = window;
        }
        self.zoom.reset();
        self.capture.cancel();
        self.pending = None;
        self.notice = None;
        self.samples.clear();

        if self.selected_tags.is_empty() {
            self.loading = false;
            return None;
        }
        self.loading = true;
        Some(self.ticket())
    }

    /// Refetch the current selection under a new generation
    pub fn reload(&mut self) -> Option<FetchTicket> {
        self.select(self.selected_tags.clone(), None)
    }

    fn ticket(&self) -> FetchTicket {
        FetchTicket {
            generation: self.generation,
            tag_ids: self.selected_tags.clone(),
            limit: self.window.fetch_limit(),
        }
    }

    /// Install fetched samples unless a newer selection superseded the ticket.
    /// A failed fetch leaves the session empty with a notice.
    pub fn apply_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: anyhow::Result<Vec<Sample>>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation {
            return FetchOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(samples) => {
                let count = samples.len();
                self.samples = samples;
                self.notice = None;
                FetchOutcome::Applied { samples: count }
            }
            Err(e) => {
                self.samples.clear();
                self.notice = Some(format!("Failed to load time-series data: {:#}", e));
                FetchOutcome::Failed
            }
        }
    }

    fn prepare(&self, registry: &TagRegistry) -> Prepared {
        let normalized = normalize_samples(&self.samples, registry, &self.selected_tags);
        let windowed = self.window.apply(&normalized).to_vec();
        let data_range = TimeRange::of_rows(&windowed);
        Prepared {
            windowed,
            data_range,
        }
    }

    /// Rows currently on screen: normalized, windowed, then restricted to the viewport
    pub fn visible_rows(&self, registry: &TagRegistry) -> Vec<NormalizedRow> {
        let prepared = self.prepare(registry);
        self.zoom.apply(&prepared.windowed).to_vec()
    }

    pub fn view(&self, registry: &TagRegistry, geometry: &ChartGeometry) -> ChartView {
        let prepared = self.prepare(registry);
        let visible_range = self.zoom.visible_range(prepared.data_range);
        let legend = self
            .selected_tags
            .iter()
            .enumerate()
            .map(|(i, tag_id)| {
                let tag = registry.get(tag_id);
                LegendEntry {
                    tag_id: tag_id.clone(),
                    tag_label: tag.map_or_else(|| tag_id.clone(), |t| t.tag_label.clone()),
                    unit: tag.map(|t| t.unit.clone()).unwrap_or_default(),
                    color: registry.color_for(tag_id, i),
                }
            })
            .collect();

        ChartView {
            selected_tags: self.selected_tags.clone(),
            time_window: self.window,
            rows: self.zoom.apply(&prepared.windowed).to_vec(),
            viewport: self.zoom.viewport(),
            data_range: prepared.data_range,
            legend,
            loading: self.loading,
            notice: self.notice.clone(),
            capture_state: self.capture.state().name(),
            pending_draft: self.pending.clone(),
            annotations: visible_range
                .map(|range| self.markers(range, geometry))
                .unwrap_or_default(),
        }
    }

    /// Committed annotations on selected tags that overlap `range`
    fn markers(&self, range: TimeRange, geometry: &ChartGeometry) -> Vec<AnnotationMarker> {
        self.annotations
            .iter()
            .filter(|a| self.selected_tags.iter().any(|t| t == a.draft.tag_id()))
            .filter_map(|a| {
                let (start, end) = a.draft.span();
                if (end as f64) < range.start || (start as f64) > range.end {
                    return None;
                }
                let (y, color) = match &a.draft {
                    AnnotationDraft::Point { display_value, .. } => (
                        Some(value_to_pixel_y(*display_value, geometry)),
                        a.details.severity.color(),
                    ),
                    AnnotationDraft::Region { .. } => (None, REGION_COLOR),
                };
                Some(AnnotationMarker {
                    id: a.id,
                    kind: a.draft.kind(),
                    tag_id: a.draft.tag_id().to_string(),
                    x_start: timestamp_to_pixel(start as f64, range, geometry),
                    x_end: timestamp_to_pixel(end as f64, range, geometry),
                    y,
                    color,
                })
            })
            .collect()
    }

    pub fn zoom(&mut self, command: ZoomCommand, registry: &TagRegistry, geometry: &ChartGeometry) {
        let prepared = self.prepare(registry);
        self.zoom.execute(command, prepared.data_range, geometry);
    }

    /// Feed a pointer event to the capture state machine. A completed gesture
    /// replaces any pending draft.
    pub fn pointer(
        &mut self,
        event: PointerEvent,
        registry: &TagRegistry,
        geometry: &ChartGeometry,
    ) -> Option<AnnotationDraft> {
        let prepared = self.prepare(registry);
        let visible = self.zoom.apply(&prepared.windowed);
        let frame = ChartFrame {
            rows: visible,
            range: self.zoom.visible_range(prepared.data_range),
            selected_tags: &self.selected_tags,
            registry,
            geometry,
        };
        let draft = self.capture.handle(event, &frame)?;
        self.pending = Some(draft.clone());
        Some(draft)
    }

    pub fn pending(&self) -> Option<&AnnotationDraft> {
        self.pending.as_ref()
    }

    /// Drop the pending draft once it has been committed, unless a newer one replaced it
    pub fn clear_pending_if(&mut self, draft: &AnnotationDraft) {
        if self.pending.as_ref() == Some(draft) {
            self.pending = None;
        }
    }

    pub fn cancel_pending(&mut self) -> Result<AnnotationDraft, ChartError> {
        self.pending.take().ok_or(ChartError::NoPendingDraft)
    }

    /// Keep a committed annotation for the overlay
    pub fn record_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }
}
