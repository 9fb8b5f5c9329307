//! Capture session management
//!
//! This module provides the `CaptureController` that manages:
//! - The idle → recording → stopping → idle state machine
//! - The clock driving duration updates and the max-duration auto-stop
//! - Convergence of manual stop, auto-stop, cancel and teardown on a single
//!   native stop per recording
//! - The reactive status snapshot consumed by UI layers

mod clock;
mod config;
mod controller;
mod recording;
mod state;
mod status;

pub use clock::Clock;
pub use config::ControllerConfig;
pub use controller::CaptureController;
pub use recording::{CompletionHandler, Recording, StopReason};
pub use state::SessionState;
pub use status::{CaptureStatus, StatusPublisher};
