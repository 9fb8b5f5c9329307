use anyhow::Result;
use std::time::Duration;

/// Native system-audio capture capability provided by the host
///
/// Platform-specific implementations:
/// - macOS: ScreenCaptureKit system audio tap
/// - Windows: WASAPI loopback
/// - Simulated: in-process backend (for testing/demo runs)
///
/// The controller is the only caller of `start`/`stop`; implementations may
/// assume at most one capture is running at a time.
#[async_trait::async_trait]
pub trait CaptureCapability: Send + Sync {
    /// Whether the host offers system audio capture at all
    ///
    /// Pure query, safe to call at any time.
    fn is_supported(&self) -> bool;

    /// Start capturing system audio
    ///
    /// `max_duration` is a hint; the backend may stop buffering beyond it.
    async fn start(&self, max_duration: Duration) -> Result<()>;

    /// Stop capturing and hand back the recorded audio payload
    async fn stop(&self) -> Result<Vec<u8>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
