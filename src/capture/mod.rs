pub mod capability;
pub mod platform;
pub mod simulated;

pub use capability::CaptureCapability;
pub use platform::{HostEnvironment, Platform};
pub use simulated::{SimulatedCapture, SimulatedCaptureConfig};
