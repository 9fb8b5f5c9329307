use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

use super::messages::{CaptureStatusMessage, RecordingCompletedMessage};
use crate::session::{CaptureStatus, Recording};

/// Destination for capture lifecycle events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_status(&self, message: &CaptureStatusMessage) -> Result<()>;

    async fn publish_completed(&self, message: &RecordingCompletedMessage) -> Result<()>;

    /// Flush anything buffered; called once when forwarding ends
    async fn close(&self) -> Result<()>;
}

/// Whether `next` differs from `prev` in anything other than the running
/// duration. Ticks alone are not worth an event.
pub fn is_transition(prev: &CaptureStatus, next: &CaptureStatus) -> bool {
    prev.state != next.state
        || prev.is_recording != next.is_recording
        || prev.error != next.error
        || prev.is_supported != next.is_supported
}

/// Publish controller lifecycle events until `shutdown` fires or the
/// controller goes away
///
/// Status changes go out as transitions only. On shutdown, a pending status
/// change and any queued recordings are sent before the sink is closed.
pub async fn forward_events<S: EventSink>(
    sink: S,
    source: String,
    mut status: watch::Receiver<CaptureStatus>,
    mut completions: mpsc::UnboundedReceiver<Recording>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    info!("Forwarding capture events from {}", source);

    let mut last = status.borrow_and_update().clone();

    loop {
        tokio::select! {
            biased;

            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                forward_status(&sink, &source, &mut last, snapshot).await;
            }
            Some(recording) = completions.recv() => {
                forward_completed(&sink, &source, &recording).await;
            }
            _ = shutdown.recv() => {
                info!("Shutdown signal received, draining capture events");
                if status.has_changed().unwrap_or(false) {
                    let snapshot = status.borrow_and_update().clone();
                    forward_status(&sink, &source, &mut last, snapshot).await;
                }
                break;
            }
        }
    }

    while let Ok(recording) = completions.try_recv() {
        forward_completed(&sink, &source, &recording).await;
    }

    info!("Capture event forwarding stopped");

    sink.close().await
}

async fn forward_status<S: EventSink>(
    sink: &S,
    source: &str,
    last: &mut CaptureStatus,
    snapshot: CaptureStatus,
) {
    if !is_transition(last, &snapshot) {
        return;
    }

    let message = CaptureStatusMessage::from_status(source, &snapshot);
    if let Err(e) = sink.publish_status(&message).await {
        warn!("{:#}", e);
    }
    *last = snapshot;
}

async fn forward_completed<S: EventSink>(sink: &S, source: &str, recording: &Recording) {
    let message = RecordingCompletedMessage::from_recording(source, recording);
    if let Err(e) = sink.publish_completed(&message).await {
        warn!("{:#}", e);
    }
}
