use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use super::state::SessionState;
use crate::error::CaptureErrorKind;

/// Reactive view of the controller for UI layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub state: SessionState,

    /// True only while the session is in `Recording`
    pub is_recording: bool,

    /// Seconds elapsed in the current recording; 0 when idle
    pub duration_secs: f64,

    /// Human-readable message of the last start/stop failure
    pub error: Option<String>,

    /// Structured code for `error`
    pub error_kind: Option<CaptureErrorKind>,

    /// Whether the host capability is available
    pub is_supported: bool,

    /// Duration of the last recording delivered to the completion handler
    pub last_recording_secs: Option<f64>,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            is_recording: false,
            duration_secs: 0.0,
            error: None,
            error_kind: None,
            is_supported: false,
            last_recording_secs: None,
        }
    }
}

/// Publishes status snapshots to subscribers until closed
///
/// Once `close` is called, `publish` drops every write so nothing reaches
/// a consumer that has gone away.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<CaptureStatus>,
    closed: AtomicBool,
}

impl StatusPublisher {
    pub fn new(initial: CaptureStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> CaptureStatus {
        self.tx.borrow().clone()
    }

    /// Returns false if the publisher is closed or the value was unchanged
    pub fn publish(&self, status: CaptureStatus) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
