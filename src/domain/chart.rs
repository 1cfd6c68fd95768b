// Chart geometry, viewport and pixel/time mapping
//
// Every pointer handler goes through `pixel_to_timestamp` and its inverses so that
// drag-zoom, region capture and point capture agree on where a pixel lands.
use super::error::ChartError;
use super::tag::DISPLAY_SCALE;
use super::telemetry::TimeRange;
use serde::{Deserialize, Serialize};

/// Visible sub-range of the timeline, `left < right`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    left: f64,
    right: f64,
}

impl Viewport {
    pub fn new(left: f64, right: f64) -> Result<Self, ChartError> {
        if !(left < right) || !left.is_finite() || !right.is_finite() {
            return Err(ChartError::InvalidViewport { left, right });
        }
        Ok(Self { left, right })
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.left, self.right)
    }
}

/// Plot area placement inside the chart surface, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartGeometry {
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub plot_width: f64,
    pub plot_height: f64,
}

impl Default for ChartGeometry {
    fn default() -> Self {
        Self {
            margin_left: 50.0,
            margin_right: 50.0,
            margin_top: 20.0,
            margin_bottom: 80.0,
            plot_width: 1000.0,
            plot_height: 400.0,
        }
    }
}

#[cfg(test)]
impl ChartGeometry {
    /// Geometry with no margins
    pub fn plot(plot_width: f64, plot_height: f64) -> Self {
        Self {
            margin_left: 0.0,
            margin_right: 0.0,
            margin_top: 0.0,
            margin_bottom: 0.0,
            plot_width,
            plot_height,
        }
    }
}

/// Pointer position relative to the chart surface's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPos {
    pub x: f64,
    pub y: f64,
}

impl PointerPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Map an x pixel to a timestamp within `range`. Pixels outside the plot clamp to its edges.
pub fn pixel_to_timestamp(px: f64, range: TimeRange, geometry: &ChartGeometry) -> f64 {
    if geometry.plot_width <= 0.0 {
        return range.start;
    }
    let ratio = ((px - geometry.margin_left) / geometry.plot_width).clamp(0.0, 1.0);
    range.start + ratio * range.span()
}

/// Y pixel of a display value; the axis is inverted, 100 at the top of the plot
pub fn value_to_pixel_y(display_value: f64, geometry: &ChartGeometry) -> f64 {
    geometry.margin_top + geometry.plot_height * (1.0 - display_value / DISPLAY_SCALE)
}

/// Inverse of [`pixel_to_timestamp`]. Timestamps outside `range` map outside the plot.
pub fn timestamp_to_pixel(timestamp_ms: f64, range: TimeRange, geometry: &ChartGeometry) -> f64 {
    if range.span() <= 0.0 {
        return geometry.margin_left;
    }
    geometry.margin_left + (timestamp_ms - range.start) / range.span() * geometry.plot_width
}
