//! HTTP server for image files and their metadata
//!
//! Provides /health, /info/{name} and static files for every other path.

use crate::error::InfoError;
use crate::timing::{track_download, DownloadStats};
use crate::types::HealthResponse;
use axum::{
    extract::{Path, State},
    http::header,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use image_info::{MetadataCache, SpeedTracker};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: Arc<MetadataCache>,
    pub speed: SpeedTracker,
    pub speed_tracking: bool,
    pub downloads: Arc<DownloadStats>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: Arc<MetadataCache>, speed_tracking: bool) -> Self {
        Self {
            speed: SpeedTracker::new(cache.clone()),
            cache,
            speed_tracking,
            downloads: Arc::new(DownloadStats::default()),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let mut files = Router::new().fallback_service(ServeDir::new(state.cache.directory()));
    if state.speed_tracking {
        files = files.layer(middleware::from_fn_with_state(state.clone(), track_download));
    }

    Router::new()
        .route("/health", get(health))
        // `{*name}` never matches an empty remainder. Bare `/info` is not
        // redirected and falls through to the file service.
        .route("/info/", get(empty_name))
        .route("/info/{*name}", get(get_info))
        .fallback_service(files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_stats = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: cache_stats,
        downloads: state.downloads.counts(),
    })
}

async fn empty_name() -> InfoError {
    InfoError::EmptyName
}

/// Names are relative to the served directory and may not climb out of it
fn validate_name(name: &str) -> Result<(), InfoError> {
    if name.is_empty() {
        return Err(InfoError::EmptyName);
    }
    if name.starts_with('/') || name.split('/').any(|part| part == "..") {
        return Err(InfoError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Get the metadata document for an image, extracting it on first request
async fn get_info(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Response, InfoError> {
    validate_name(&name)?;
    info!(name = %name, "info about image");

    let document = state.cache.get_or_populate(&name).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        document.as_bytes().to_vec(),
    )
        .into_response())
}
