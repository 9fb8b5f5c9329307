pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod session;

pub use capture::{
    CaptureCapability, HostEnvironment, Platform, SimulatedCapture, SimulatedCaptureConfig,
};
pub use config::Config;
pub use error::{CaptureError, CaptureErrorKind};
pub use http::{create_router, AppState, RecordingStore};
pub use nats::{CaptureStatusMessage, NatsClient, RecordingCompletedMessage};
pub use session::{
    CaptureController, CaptureStatus, CompletionHandler, ControllerConfig, Recording,
    SessionState, StopReason,
};
