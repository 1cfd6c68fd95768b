// Domain error types

/// Errors raised by chart preparation and annotation handling
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    /// Viewport bounds must satisfy `left < right`
    #[error("invalid viewport: left {left} must be before right {right}")]
    InvalidViewport { left: f64, right: f64 },

    /// Tag range is inverted or not finite
    #[error("invalid range for tag {tag_id}: [{min}, {max}]")]
    InvalidTagRange { tag_id: String, min: f64, max: f64 },

    /// Unrecognised time window selector
    #[error("unknown time window: {0}")]
    UnknownTimeWindow(String),

    /// Annotation confirmed without a description
    #[error("annotation description must not be empty")]
    EmptyDescription,

    /// Confirm or cancel with nothing pending
    #[error("no pending annotation draft")]
    NoPendingDraft,

    #[error("unknown chart session: {0}")]
    UnknownSession(String),
}
