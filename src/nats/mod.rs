pub mod client;
pub mod forwarder;
pub mod messages;

pub use client::NatsClient;
pub use forwarder::{forward_events, is_transition, EventSink};
pub use messages::{CaptureStatusMessage, RecordingCompletedMessage};
