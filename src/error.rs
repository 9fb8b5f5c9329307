use serde::{Deserialize, Serialize};
use thiserror::Error;

const START_FALLBACK: &str = "Failed to start system audio capture. Please check permissions.";
const STOP_FALLBACK: &str = "Failed to stop system audio capture.";

/// Errors surfaced by the capture controller.
///
/// These never escape the controller as faults; they end up in the
/// `error` field of [`crate::CaptureStatus`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Not running inside the native host.
    #[error("System audio capture is only available in the desktop app.")]
    EnvironmentUnsupported,

    /// Host platform does not offer system audio capture.
    #[error("System audio capture is not supported on this platform.")]
    CapabilityUnsupported,

    /// Native start call rejected (permissions, device conflict, ...).
    #[error("{0}")]
    StartFailure(String),

    /// Native stop call rejected; the payload is unavailable.
    #[error("{0}")]
    StopFailure(String),
}

/// Structured error code, serialized alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureErrorKind {
    EnvironmentUnsupported,
    CapabilityUnsupported,
    StartFailure,
    StopFailure,
}

impl CaptureError {
    pub fn kind(&self) -> CaptureErrorKind {
        match self {
            Self::EnvironmentUnsupported => CaptureErrorKind::EnvironmentUnsupported,
            Self::CapabilityUnsupported => CaptureErrorKind::CapabilityUnsupported,
            Self::StartFailure(_) => CaptureErrorKind::StartFailure,
            Self::StopFailure(_) => CaptureErrorKind::StopFailure,
        }
    }

    /// Wrap a native start error, falling back to a generic message when
    /// the backend gave none.
    pub fn start_failure(err: &anyhow::Error) -> Self {
        Self::StartFailure(message_or(err, START_FALLBACK))
    }

    /// Wrap a native stop error, falling back to a generic message when
    /// the backend gave none.
    pub fn stop_failure(err: &anyhow::Error) -> Self {
        Self::StopFailure(message_or(err, STOP_FALLBACK))
    }

    /// The payload was captured but the completion handler panicked while
    /// taking it.
    pub fn completion_failure(detail: &str) -> Self {
        Self::StopFailure(format!("Failed to deliver recording: {}", detail))
    }
}

fn message_or(err: &anyhow::Error, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
