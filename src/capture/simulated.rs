// In-process capture backend that stands in for the native hooks

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::capability::CaptureCapability;

/// Configuration for the simulated backend
#[derive(Debug, Clone)]
pub struct SimulatedCaptureConfig {
    /// Sample rate of the generated PCM
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Delay before `start` resolves
    pub start_latency: Duration,
    /// Delay before `stop` resolves
    pub stop_latency: Duration,
    /// Whether `is_supported` reports true
    pub supported: bool,
}

impl Default for SimulatedCaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz
            channels: 1,        // Mono
            start_latency: Duration::ZERO,
            stop_latency: Duration::ZERO,
            supported: true,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    capturing_since: Option<Instant>,
    max_duration: Duration,
    fail_next_start: Option<String>,
    fail_stops: Option<String>,
}

/// Simulated system-audio capture
///
/// Produces silent 16-bit little-endian PCM sized by the time between
/// `start` and `stop`, capped at the max-duration hint. Failures can be
/// injected and every call is counted.
#[derive(Debug)]
pub struct SimulatedCapture {
    config: SimulatedCaptureConfig,
    state: Mutex<SimState>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl SimulatedCapture {
    pub fn new(config: SimulatedCaptureConfig) -> Self {
        info!(
            "Simulated capture initialized ({}Hz, {} channels)",
            config.sample_rate, config.channels
        );

        Self {
            config,
            state: Mutex::new(SimState::default()),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// Backend that reports the capability as unavailable
    pub fn unsupported() -> Self {
        Self::new(SimulatedCaptureConfig {
            supported: false,
            ..Default::default()
        })
    }

    /// Make the next `start` call fail with `message`
    pub fn fail_next_start(&self, message: impl Into<String>) {
        self.lock().fail_next_start = Some(message.into());
    }

    /// Make every `stop` call fail with `message` until cleared
    pub fn fail_stops(&self, message: impl Into<String>) {
        self.lock().fail_stops = Some(message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_next_start = None;
        state.fail_stops = None;
    }

    /// Number of `start` calls received, including failed ones
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls received, including failed ones
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().capturing_since.is_some()
    }

    /// Bytes of PCM produced for `elapsed` of capture
    pub fn payload_len(&self, elapsed: Duration) -> usize {
        let frames = (elapsed.as_secs_f64() * self.config.sample_rate as f64) as usize;
        frames * self.config.channels as usize * std::mem::size_of::<i16>()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedCapture {
    fn default() -> Self {
        Self::new(SimulatedCaptureConfig::default())
    }
}

#[async_trait::async_trait]
impl CaptureCapability for SimulatedCapture {
    fn is_supported(&self) -> bool {
        self.config.supported
    }

    async fn start(&self, max_duration: Duration) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.start_latency.is_zero() {
            tokio::time::sleep(self.config.start_latency).await;
        }

        let mut state = self.lock();
        if let Some(message) = state.fail_next_start.take() {
            bail!(message);
        }
        if state.capturing_since.is_some() {
            bail!("Capture device busy: a capture is already running");
        }

        state.capturing_since = Some(Instant::now());
        state.max_duration = max_duration;

        debug!("Simulated capture started (max {:?})", max_duration);

        Ok(())
    }

    async fn stop(&self) -> Result<Vec<u8>> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.stop_latency.is_zero() {
            tokio::time::sleep(self.config.stop_latency).await;
        }

        let (elapsed, failure) = {
            let mut state = self.lock();
            let failure = state.fail_stops.clone();
            let Some(since) = state.capturing_since.take() else {
                bail!("No capture in progress");
            };
            (since.elapsed().min(state.max_duration), failure)
        };

        // The native side releases the device even when handing back the
        // buffer fails.
        if let Some(message) = failure {
            bail!(message);
        }

        let payload = vec![0u8; self.payload_len(elapsed)];

        debug!(
            "Simulated capture stopped ({:.2}s, {} bytes)",
            elapsed.as_secs_f64(),
            payload.len()
        );

        Ok(payload)
    }

    fn name(&self) -> &str {
        "Simulated capture"
    }
}
