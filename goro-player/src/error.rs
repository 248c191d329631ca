//! Error types for goro-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::resolver::ResolveError;
use crate::voice::VoiceError;

/// Errors returned by playback control operations
///
/// These are user-facing: the command layer renders them as replies. A control
/// error never changes queue or session state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// No live session for the tenant
    #[error("Not connected to a voice channel")]
    NotConnected,

    /// Session exists but nothing is queued
    #[error("The queue is empty")]
    QueueEmpty,

    /// The link could not be classified, so nothing was queued
    #[error("{0}")]
    Unsupported(ResolveError),

    /// The engine is shutting down
    #[error("Playback engine is shutting down")]
    EngineShutdown,
}

impl ControlError {
    /// Stable machine-readable tag
    pub fn error_tag(&self) -> &'static str {
        match self {
            ControlError::NotConnected => "not_connected",
            ControlError::QueueEmpty => "queue_empty",
            ControlError::Unsupported(e) => e.error_tag(),
            ControlError::EngineShutdown => "engine_shutdown",
        }
    }
}

/// Main error type for goro-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] goro_common::Error),

    /// Source resolution errors
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Playback control errors
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// Channel or player errors
    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    /// HTTP client setup errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using goro-player Error
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP API error
///
/// Rendered as `{"error": <tag>, "message": <text>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Control command rejected
    #[error(transparent)]
    Control(#[from] ControlError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Control(ControlError::NotConnected | ControlError::QueueEmpty) => {
                StatusCode::CONFLICT
            }
            ApiError::Control(ControlError::Unsupported(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Control(ControlError::EngineShutdown) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_tag(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Control(e) => e.error_tag(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error_tag(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_error_tags() {
        assert_eq!(ControlError::NotConnected.error_tag(), "not_connected");
        assert_eq!(ControlError::QueueEmpty.error_tag(), "queue_empty");
        assert_eq!(
            ControlError::Unsupported(ResolveError::UnsupportedLink("x".into())).error_tag(),
            "unsupported_link"
        );
    }

    #[test]
    fn test_control_error_messages_are_user_facing() {
        assert_eq!(ControlError::NotConnected.to_string(), "Not connected to a voice channel");
        assert_eq!(
            ControlError::Unsupported(ResolveError::UnsupportedLink("ftp://x".into())).to_string(),
            "Unsupported link: ftp://x"
        );
    }

    #[test]
    fn test_api_error_status_mapping() {
        assert_eq!(ApiError::from(ControlError::NotConnected).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(ControlError::QueueEmpty).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(ControlError::EngineShutdown).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::BadRequest("x".into()).error_tag(), "bad_request");
    }
}
