use crate::session::{CaptureController, CompletionHandler, Recording};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single capture controller for this host
    pub controller: Arc<CaptureController>,

    /// Most recent recording delivered by the controller
    pub recordings: RecordingStore,
}

impl AppState {
    pub fn new(controller: Arc<CaptureController>, recordings: RecordingStore) -> Self {
        Self {
            controller,
            recordings,
        }
    }
}

/// Keeps the latest completed recording in memory
///
/// Register a clone as the controller's completion handler.
#[derive(Clone, Default)]
pub struct RecordingStore {
    latest: Arc<RwLock<Option<Recording>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Recording> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store(&self, recording: Recording) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(recording);
    }
}

impl CompletionHandler for RecordingStore {
    fn on_recording_complete(&self, recording: Recording) {
        self.store(recording);
    }
}
