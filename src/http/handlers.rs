use super::state::AppState;
use crate::error::CaptureErrorKind;
use crate::session::{CaptureStatus, Recording, StopReason};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub id: Uuid,
    pub reason: StopReason,
    pub duration_secs: Option<f64>,
    pub byte_len: usize,
    pub completed_at: DateTime<Utc>,
    /// Raw PCM, base64-encoded
    pub pcm: String,
}

impl From<Recording> for RecordingResponse {
    fn from(recording: Recording) -> Self {
        Self {
            id: recording.id,
            reason: recording.reason,
            duration_secs: recording.duration_secs(),
            byte_len: recording.payload.len(),
            completed_at: recording.completed_at,
            pcm: base64::engine::general_purpose::STANDARD.encode(&recording.payload),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /capture/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.controller.status()))
}

/// POST /capture/start
/// Start a new recording
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP request to start recording");

    state.controller.start_recording().await;
    let status = state.controller.status();

    let code = match status.error_kind {
        Some(CaptureErrorKind::EnvironmentUnsupported | CaptureErrorKind::CapabilityUnsupported) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Some(CaptureErrorKind::StartFailure) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };

    if code != StatusCode::OK {
        warn!("Start request failed: {}", status.error.as_deref().unwrap_or_default());
    }

    (code, Json(status))
}

/// POST /capture/stop
/// Stop the active recording
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP request to stop recording");

    if !state.controller.is_recording() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "No recording in progress".to_string(),
            }),
        )
            .into_response();
    }

    state.controller.stop_recording().await;
    let status = state.controller.status();

    (stop_status_code(&status), Json(status)).into_response()
}

/// POST /capture/cancel
/// Cancel the active recording, if any
pub async fn cancel_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("HTTP request to cancel recording");

    state.controller.cancel_recording().await;
    let status = state.controller.status();

    (stop_status_code(&status), Json(status))
}

/// GET /capture/recordings/latest
/// Most recent completed recording, with its PCM payload
pub async fn get_latest_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.recordings.latest() {
        Some(recording) => (StatusCode::OK, Json(RecordingResponse::from(recording))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No recording available".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn stop_status_code(status: &CaptureStatus) -> StatusCode {
    match status.error_kind {
        Some(CaptureErrorKind::StopFailure) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    }
}
