// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::chart_service::ChartService;
use crate::infrastructure::config::{load_app_config, Preferences};
use crate::infrastructure::http_repository::HttpChartRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    cancel_annotation, close_session, confirm_annotation, export_chart, get_chart, get_preferences, health_check,
    list_tags, list_violations, post_pointer, post_zoom, put_preferences, put_selection,
    refresh_tags, reload_chart,
};

const DEFAULT_LOG_FILTER: &str = "chart_annotator=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    let preferences = Preferences::load(&config.preferences_path)?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(HttpChartRepository::new(&config.backend)?);

    // Create services (application layer)
    let chart_service = ChartService::new(
        repository,
        config.chart,
        preferences,
        config.preferences_path.clone(),
    );
    if let Err(e) = chart_service.refresh_tags().await {
        tracing::warn!("Starting without tags: {}", e);
    }

    // Evict idle sessions in the background
    let max_idle = Duration::from_secs(config.server.session_idle_secs);
    let sweeper = chart_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(max_idle.max(Duration::from_secs(1)) / 2);
        loop {
            interval.tick().await;
            sweeper.evict_idle(max_idle).await;
        }
    });

    let state = Arc::new(AppState { chart_service });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/tags", get(list_tags))
        .route("/tags/refresh", post(refresh_tags))
        .route("/sessions/:id", delete(close_session))
        .route("/sessions/:id/chart", get(get_chart))
        .route("/sessions/:id/reload", post(reload_chart))
        .route("/sessions/:id/selection", put(put_selection))
        .route("/sessions/:id/zoom", post(post_zoom))
        .route("/sessions/:id/pointer", post(post_pointer))
        .route(
            "/sessions/:id/annotation",
            post(confirm_annotation).delete(cancel_annotation),
        )
        .route("/sessions/:id/export", get(export_chart))
        .route("/sessions/:id/violations", get(list_violations))
        .route("/preferences", get(get_preferences).put(put_preferences))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!(
        "Starting chart-annotator on {} (backend {})",
        addr,
        config.backend.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
