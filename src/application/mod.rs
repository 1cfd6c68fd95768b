// Application layer - Chart preparation use cases
pub mod annotation_capture;
pub mod chart_repository;
pub mod chart_service;
pub mod chart_session;
pub mod export;
pub mod normalizer;
pub mod time_window;
pub mod viewport;
