//! HTTP API server for host-side control
//!
//! This module provides a REST API around the capture controller:
//! - POST /capture/start - Start a recording
//! - POST /capture/stop - Stop the active recording
//! - POST /capture/cancel - Cancel the active recording
//! - GET /capture/status - Current controller status
//! - GET /capture/recordings/latest - Last completed recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, RecordingResponse};
pub use routes::create_router;
pub use state::{AppState, RecordingStore};
