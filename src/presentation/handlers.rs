// HTTP request handlers
use crate::application::annotation_capture::PointerEvent;
use crate::application::time_window::TimeWindow;
use crate::application::viewport::ZoomCommand;
use crate::domain::annotation::AnnotationDetails;
use crate::infrastructure::config::Preferences;
use crate::infrastructure::http_response::{accepts_brotli, csv_response, json_response};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Response, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

type ApiResult = Result<Response<Body>, ApiError>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub tag_ids: Vec<String>,
    pub window: Option<String>,
}

async fn json<T: Serialize>(data: &T, headers: &HeaderMap) -> ApiResult {
    json_response(data, accepts_brotli(headers))
        .await
        .map_err(ApiError::Encoding)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List the cached tag registry
pub async fn list_tags(headers: HeaderMap, State(state): State<Arc<AppState>>) -> ApiResult {
    let tags = state.chart_service.tags().await;
    json(&tags, &headers).await
}

/// Refetch tags from the backend
pub async fn refresh_tags(headers: HeaderMap, State(state): State<Arc<AppState>>) -> ApiResult {
    let count = state.chart_service.refresh_tags().await?;
    json(&json!({ "tags": count }), &headers).await
}

pub async fn get_chart(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let view = state.chart_service.chart_view(&id).await;
    json(&view, &headers).await
}

/// Replace the session's tag selection (and optionally its window) and load data
pub async fn put_selection(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectionRequest>,
) -> ApiResult {
    let window = request
        .window
        .as_deref()
        .map(str::parse::<TimeWindow>)
        .transpose()?;
    let view = state
        .chart_service
        .select(&id, request.tag_ids, window)
        .await;
    json(&view, &headers).await
}

pub async fn close_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.chart_service.close_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reload_chart(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let view = state.chart_service.reload(&id).await;
    json(&view, &headers).await
}

pub async fn post_zoom(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(command): Json<ZoomCommand>,
) -> ApiResult {
    let view = state.chart_service.zoom(&id, command).await;
    json(&view, &headers).await
}

/// Feed one pointer event; responds with the draft when the gesture completed one
pub async fn post_pointer(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(event): Json<PointerEvent>,
) -> ApiResult {
    let draft = state.chart_service.pointer(&id, event).await;
    let duration_minutes = draft.as_ref().and_then(|d| d.duration_minutes());
    json(
        &json!({ "draft": draft, "durationMinutes": duration_minutes }),
        &headers,
    )
    .await
}

pub async fn confirm_annotation(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(details): Json<AnnotationDetails>,
) -> ApiResult {
    let annotation = state.chart_service.confirm_annotation(&id, details).await?;
    json(&annotation, &headers).await
}

pub async fn cancel_annotation(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.chart_service.cancel_annotation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_chart(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let csv = state.chart_service.export_csv(&id).await;
    csv_response(csv, accepts_brotli(&headers))
        .await
        .map_err(ApiError::Encoding)
}

pub async fn list_violations(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let violations = state.chart_service.violations(&id).await;
    json(&violations, &headers).await
}

pub async fn get_preferences(headers: HeaderMap, State(state): State<Arc<AppState>>) -> ApiResult {
    let preferences = state.chart_service.preferences().await;
    json(&preferences, &headers).await
}

pub async fn put_preferences(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(preferences): Json<Preferences>,
) -> ApiResult {
    state
        .chart_service
        .save_preferences(preferences.clone())
        .await?;
    json(&preferences, &headers).await
}
