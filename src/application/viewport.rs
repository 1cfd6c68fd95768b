// Zoom/viewport controller - user-adjustable visible sub-range of the timeline
use crate::domain::chart::{pixel_to_timestamp, ChartGeometry, Viewport};
use crate::domain::telemetry::{NormalizedRow, TimeRange};
use serde::Deserialize;

/// Minimum horizontal drag, in pixels, before a drag changes the zoom
pub const DRAG_ZOOM_THRESHOLD_PX: f64 = 20.0;

/// Narrowest viewport zoom-in will produce, in milliseconds
const MIN_SPAN_MS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ZoomCommand {
    In,
    Out,
    Reset,
    /// Drag along the time axis; right zooms in, left zooms out, around `anchor_x`
    #[serde(rename_all = "camelCase")]
    Drag { pixel_delta: f64, anchor_x: f64 },
}

/// Holds the current viewport; `None` shows all windowed data
#[derive(Debug, Clone, Default)]
pub struct ZoomController {
    viewport: Option<Viewport>,
}

impl ZoomController {
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Range currently on screen: the viewport, or the full data range when un-zoomed
    pub fn visible_range(&self, data_range: Option<TimeRange>) -> Option<TimeRange> {
        self.viewport.map(|v| v.range()).or(data_range)
    }

    pub fn reset(&mut self) {
        self.viewport = None;
    }

    /// Halve the visible range around its center
    pub fn zoom_in(&mut self, data_range: Option<TimeRange>) {
        if let Some(current) = self.visible_range(data_range) {
            self.scale_around(current, current.center(), 0.5, data_range);
        }
    }

    /// Double the visible range around its center, never past the data range
    pub fn zoom_out(&mut self, data_range: Option<TimeRange>) {
        if let Some(current) = self.visible_range(data_range) {
            self.scale_around(current, current.center(), 2.0, data_range);
        }
    }

    /// Zoom by 0.5x (drag right) or 2x (drag left) around the anchor timestamp
    pub fn drag_zoom(&mut self, pixel_delta: f64, anchor_ms: f64, data_range: Option<TimeRange>) {
        if pixel_delta.abs() <= DRAG_ZOOM_THRESHOLD_PX {
            return;
        }
        let Some(current) = self.visible_range(data_range) else {
            return;
        };
        let factor = if pixel_delta > 0.0 { 0.5 } else { 2.0 };
        self.scale_around(current, anchor_ms, factor, data_range);
    }

    pub fn execute(
        &mut self,
        command: ZoomCommand,
        data_range: Option<TimeRange>,
        geometry: &ChartGeometry,
    ) {
        match command {
            ZoomCommand::In => self.zoom_in(data_range),
            ZoomCommand::Out => self.zoom_out(data_range),
            ZoomCommand::Reset => self.reset(),
            ZoomCommand::Drag {
                pixel_delta,
                anchor_x,
            } => {
                let Some(current) = self.visible_range(data_range) else {
                    return;
                };
                let anchor_ms = pixel_to_timestamp(anchor_x, current, geometry);
                self.drag_zoom(pixel_delta, anchor_ms, data_range);
            }
        }
    }

    /// Rows inside the viewport (inclusive). Rows must be sorted; the result is contiguous.
    pub fn apply<'a>(&self, rows: &'a [NormalizedRow]) -> &'a [NormalizedRow] {
        let Some(viewport) = self.viewport else {
            return rows;
        };
        let start = rows.partition_point(|r| (r.timestamp_ms as f64) < viewport.left());
        let end = rows.partition_point(|r| (r.timestamp_ms as f64) <= viewport.right());
        &rows[start..end.max(start)]
    }

    fn scale_around(
        &mut self,
        current: TimeRange,
        center: f64,
        factor: f64,
        data_range: Option<TimeRange>,
    ) {
        let half = current.span() * factor / 2.0;
        let (mut left, mut right) = (center - half, center + half);

        if factor < 1.0 {
            if half * 2.0 < MIN_SPAN_MS {
                tracing::debug!("Zoom-in ignored, viewport already at minimum span");
                return;
            }
        } else {
            // Without data there is nothing to bound the viewport by
            let Some(full) = data_range else {
                self.viewport = None;
                return;
            };
            left = left.max(full.start);
            right = right.min(full.end);
            if left <= full.start && right >= full.end {
                self.viewport = None;
                return;
            }
        }

        match Viewport::new(left, right) {
            Ok(viewport) => self.viewport = Some(viewport),
            Err(e) => tracing::debug!("Zoom ignored: {}", e),
        }
    }
}
