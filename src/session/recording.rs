use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// What ended a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop_recording` was called
    Manual,
    /// The clock reached the configured max duration
    MaxDuration,
    /// `cancel_recording` was called
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Manual => "manual",
            Self::MaxDuration => "max_duration",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A finished recording handed to the completion handler
#[derive(Debug, Clone)]
pub struct Recording {
    /// Unique recording identifier
    pub id: Uuid,

    /// Raw audio bytes returned by the capture backend
    pub payload: Vec<u8>,

    /// Wall time from capture start to the stop call resolving
    pub duration: Option<Duration>,

    /// Why the recording ended
    pub reason: StopReason,

    /// When the payload was received
    pub completed_at: DateTime<Utc>,
}

impl Recording {
    pub(crate) fn new(payload: Vec<u8>, duration: Option<Duration>, reason: StopReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            duration,
            reason,
            completed_at: Utc::now(),
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }
}

/// Receives recordings once per successful start-to-stop cycle
///
/// Called from the task that performed the stop. Keep it short; hand heavy
/// work off to another task.
pub trait CompletionHandler: Send + Sync {
    fn on_recording_complete(&self, recording: Recording);
}

impl<F> CompletionHandler for F
where
    F: Fn(Recording) + Send + Sync,
{
    fn on_recording_complete(&self, recording: Recording) {
        self(recording)
    }
}
