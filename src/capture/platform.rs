use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::capability::CaptureCapability;

/// Where the host application is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEnvironment {
    /// Native desktop runtime; the capture capability is operable here
    #[default]
    Native,
    /// Plain browser context; capture is always unavailable
    Browser,
}

impl HostEnvironment {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }
}

/// Host context injected into a controller
///
/// One controller is built per platform value; there is no global instance.
#[derive(Clone)]
pub struct Platform {
    pub environment: HostEnvironment,
    pub capture: Arc<dyn CaptureCapability>,
}

impl Platform {
    pub fn new(environment: HostEnvironment, capture: Arc<dyn CaptureCapability>) -> Self {
        Self {
            environment,
            capture,
        }
    }

    /// Native host backed by the given capability
    pub fn native(capture: Arc<dyn CaptureCapability>) -> Self {
        Self::new(HostEnvironment::Native, capture)
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("environment", &self.environment)
            .field("capture", &self.capture.name())
            .finish()
    }
}
