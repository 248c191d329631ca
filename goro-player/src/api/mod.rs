//! HTTP control surface
//!
//! Thin adapter over the playback engine and ambient controller for a chat
//! command layer (or an operator) running out of process.

pub mod handlers;
pub mod sse;

use axum::{
    routing::{get, post},
    Router,
};
use goro_common::events::SignalBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ambient::AmbientController;
use crate::playback::PlaybackEngine;
use crate::resolver::SourceResolver;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Builds queue entries from links
    pub resolver: Arc<SourceResolver>,
    pub engine: PlaybackEngine,
    pub ambient: AmbientController,
    pub signals: SignalBus,
    /// Server port (reported by /health)
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(sse::event_stream))
        // Queue
        .route(
            "/tenants/:tenant/queue",
            get(handlers::get_queue).post(handlers::enqueue),
        )
        .route("/tenants/:tenant/status", get(handlers::get_status))
        // Controls
        .route("/tenants/:tenant/pause", post(handlers::pause))
        .route("/tenants/:tenant/resume", post(handlers::resume))
        .route("/tenants/:tenant/skip", post(handlers::skip))
        .route("/tenants/:tenant/stop", post(handlers::stop))
        .route("/tenants/:tenant/shuffle", post(handlers::shuffle))
        // Ambient
        .route("/tenants/:tenant/occupancy", post(handlers::occupancy))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
