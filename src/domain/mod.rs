// Domain layer - Chart data models and pure chart math
pub mod annotation;
pub mod chart;
pub mod error;
pub mod rule;
pub mod tag;
pub mod telemetry;
