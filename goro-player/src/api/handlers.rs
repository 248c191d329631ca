//! HTTP request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use goro_common::types::{ChannelId, ChannelRef, TenantId, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult, ControlError};
use crate::playback::{EnqueueOutcome, QueueEntry, SessionState, SessionStatus, SkipOutcome};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
    active_sessions: usize,
    ambient_tenants: usize,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub channel_id: ChannelId,
    pub link: String,
    pub requested_by: UserId,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    tenant: TenantId,
    tracks: Vec<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    session: SessionStatus,
    ambient_suspended: bool,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    dropped: usize,
}

#[derive(Debug, Serialize)]
pub struct ShuffleResponse {
    queue_len: usize,
}

#[derive(Debug, Deserialize)]
pub struct OccupancyRequest {
    pub channel_id: ChannelId,
    pub listeners: usize,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "goro-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: state.port,
        active_sessions: state.engine.active_tenants().len(),
        ambient_tenants: state.ambient.tracked_tenants(),
    })
}

// ============================================================================
// Queue Endpoints
// ============================================================================

/// POST /tenants/:tenant/queue
///
/// Returns 201 when the track started a new session, 200 when it was queued
/// behind others.
pub async fn enqueue(
    State(state): State<AppState>,
    Path(tenant): Path<u64>,
    Json(req): Json<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<EnqueueOutcome>)> {
    if req.link.trim().is_empty() {
        return Err(ApiError::BadRequest("link must not be empty".to_string()));
    }

    let channel = ChannelRef::new(TenantId::new(tenant), req.channel_id);
    let track = state
        .resolver
        .describe(req.link.trim(), req.requested_by)
        .await
        .map_err(ControlError::Unsupported)?;

    let outcome = state.engine.enqueue(channel, track).await?;
    info!(tenant, position = outcome.position, "Enqueue via API");

    let status = if outcome.started {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// GET /tenants/:tenant/queue
pub async fn get_queue(State(state): State<AppState>, Path(tenant): Path<u64>) -> Json<QueueResponse> {
    let tenant = TenantId::new(tenant);
    Json(QueueResponse {
        tenant,
        tracks: state.engine.queue(tenant).await,
    })
}

/// GET /tenants/:tenant/status
pub async fn get_status(State(state): State<AppState>, Path(tenant): Path<u64>) -> Json<StatusResponse> {
    let tenant = TenantId::new(tenant);
    Json(StatusResponse {
        session: state.engine.status(tenant).await,
        ambient_suspended: state.ambient.is_suspended(tenant),
    })
}

// ============================================================================
// Control Endpoints
// ============================================================================

/// POST /tenants/:tenant/pause
pub async fn pause(State(state): State<AppState>, Path(tenant): Path<u64>) -> ApiResult<Json<StateResponse>> {
    let state = state.engine.pause(TenantId::new(tenant)).await?;
    Ok(Json(StateResponse { state }))
}

/// POST /tenants/:tenant/resume
pub async fn resume(State(state): State<AppState>, Path(tenant): Path<u64>) -> ApiResult<Json<StateResponse>> {
    let state = state.engine.resume(TenantId::new(tenant)).await?;
    Ok(Json(StateResponse { state }))
}

/// POST /tenants/:tenant/skip
pub async fn skip(State(state): State<AppState>, Path(tenant): Path<u64>) -> ApiResult<Json<SkipOutcome>> {
    Ok(Json(state.engine.skip(TenantId::new(tenant)).await?))
}

/// POST /tenants/:tenant/stop
pub async fn stop(State(state): State<AppState>, Path(tenant): Path<u64>) -> Json<StopResponse> {
    let dropped = state.engine.stop(TenantId::new(tenant)).await;
    Json(StopResponse { dropped })
}

/// POST /tenants/:tenant/shuffle
pub async fn shuffle(State(state): State<AppState>, Path(tenant): Path<u64>) -> ApiResult<Json<ShuffleResponse>> {
    let queue_len = state.engine.shuffle(TenantId::new(tenant)).await?;
    Ok(Json(ShuffleResponse { queue_len }))
}

// ============================================================================
// Ambient Endpoints
// ============================================================================

/// POST /tenants/:tenant/occupancy
pub async fn occupancy(
    State(state): State<AppState>,
    Path(tenant): Path<u64>,
    Json(req): Json<OccupancyRequest>,
) -> StatusCode {
    let channel = ChannelRef::new(TenantId::new(tenant), req.channel_id);
    state.ambient.occupancy_changed(channel, req.listeners);
    StatusCode::ACCEPTED
}
