use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::clock::Clock;
use super::status::CaptureStatus;
use crate::error::CaptureError;

/// Capture session state machine.
///
/// ```text
/// idle → recording → stopping → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Stopping,
}

/// Mutable session fields, owned by the controller behind its mutex
#[derive(Debug, Default)]
pub(crate) struct CaptureSession {
    pub state: SessionState,
    pub started_at: Option<Instant>,
    pub elapsed: Duration,
    pub last_error: Option<CaptureError>,
    pub supported: bool,
    /// A capability start call is outstanding
    pub starting: bool,
    /// Bumped on every entry to `Recording`; ticks from older clocks are ignored
    pub generation: u64,
    pub clock: Option<Clock>,
    pub last_recording: Option<Duration>,
}

impl CaptureSession {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            ..Default::default()
        }
    }

    /// Idle with no start outstanding
    pub fn is_quiescent(&self) -> bool {
        self.state == SessionState::Idle && !self.starting
    }

    pub fn cancel_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
    }

    /// Enter `Recording` and return the new generation
    pub fn begin(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.state = SessionState::Recording;
        self.started_at = Some(now);
        self.elapsed = Duration::ZERO;
        self.generation
    }

    pub fn reset(&mut self) {
        self.cancel_clock();
        self.state = SessionState::Idle;
        self.started_at = None;
        self.elapsed = Duration::ZERO;
    }

    /// Zero the duration and drop any clock left behind by a cancel,
    /// unless a new recording has already begun. Returns whether anything
    /// was touched.
    pub fn settle_after_cancel(&mut self) -> bool {
        if self.state == SessionState::Recording {
            return false;
        }
        self.elapsed = Duration::ZERO;
        self.cancel_clock();
        true
    }

    pub fn snapshot(&self) -> CaptureStatus {
        CaptureStatus {
            state: self.state,
            is_recording: self.state == SessionState::Recording,
            duration_secs: self.elapsed.as_secs_f64(),
            error: self.last_error.as_ref().map(|e| e.to_string()),
            error_kind: self.last_error.as_ref().map(|e| e.kind()),
            is_supported: self.supported,
            last_recording_secs: self.last_recording.map(|d| d.as_secs_f64()),
        }
    }
}
