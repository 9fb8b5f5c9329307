use anyhow::{ensure, Result};
use std::time::Duration;

/// Configuration for a capture controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Hard ceiling for one recording; the controller auto-stops here
    /// Default: 29 seconds
    pub max_duration: Duration,

    /// Clock tick interval driving duration updates and the auto-stop check
    /// Default: 100 milliseconds
    pub tick_interval: Duration,

    /// Whether `cancel_recording` drops the payload instead of delivering it
    /// to the completion handler
    pub discard_on_cancel: bool,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.max_duration.is_zero(), "max_duration must be positive");
        ensure!(!self.tick_interval.is_zero(), "tick_interval must be positive");
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(29),
            tick_interval: Duration::from_millis(100),
            discard_on_cancel: false,
        }
    }
}
