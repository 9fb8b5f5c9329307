use serde::{Deserialize, Serialize};

use crate::error::CaptureErrorKind;
use crate::session::{CaptureStatus, Recording, SessionState, StopReason};

/// Controller status transition published to NATS
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureStatusMessage {
    pub source: String,
    pub state: SessionState,
    pub is_recording: bool,
    pub error: Option<String>,
    pub error_kind: Option<CaptureErrorKind>,
    pub timestamp: String, // RFC3339 timestamp
}

impl CaptureStatusMessage {
    pub fn from_status(source: &str, status: &CaptureStatus) -> Self {
        Self {
            source: source.to_string(),
            state: status.state,
            is_recording: status.is_recording,
            error: status.error.clone(),
            error_kind: status.error_kind,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Summary of a delivered recording (no audio) published to NATS
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordingCompletedMessage {
    pub source: String,
    pub recording_id: String,
    pub reason: StopReason,
    pub duration_secs: Option<f64>,
    pub byte_len: usize,
    pub timestamp: String, // RFC3339 timestamp
}

impl RecordingCompletedMessage {
    pub fn from_recording(source: &str, recording: &Recording) -> Self {
        Self {
            source: source.to_string(),
            recording_id: recording.id.to_string(),
            reason: recording.reason,
            duration_secs: recording.duration_secs(),
            byte_len: recording.payload.len(),
            timestamp: recording.completed_at.to_rfc3339(),
        }
    }
}
