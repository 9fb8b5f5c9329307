use anyhow::Result;
use std::future::Future;
use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::config::ControllerConfig;
use super::recording::{CompletionHandler, Recording, StopReason};
use super::state::{CaptureSession, SessionState};
use super::status::{CaptureStatus, StatusPublisher};
use crate::capture::Platform;
use crate::error::CaptureError;

/// Owns one capture session at a time and mediates every call to the
/// platform's capture capability.
///
/// Manual stop, auto-stop, cancel and teardown can race; all of them claim
/// the session through a single atomic mirror flag, so exactly one of them
/// performs the native stop per recording.
pub struct CaptureController {
    shared: Arc<Shared>,
}

struct Shared {
    config: ControllerConfig,
    platform: Platform,
    session: Mutex<CaptureSession>,
    /// Synchronous mirror of `state == Recording`. Claimed with a
    /// compare-and-swap by whichever trigger stops the session.
    active: AtomicBool,
    disposed: AtomicBool,
    status: StatusPublisher,
    on_complete: Option<Arc<dyn CompletionHandler>>,
}

enum StartOutcome {
    Failed,
    Running,
    /// Torn down while the native start was outstanding
    Orphaned,
}

impl CaptureController {
    /// Create a controller with no completion handler
    pub fn new(platform: Platform, config: ControllerConfig) -> Result<Self> {
        Self::build(platform, config, None)
    }

    /// Create a controller that hands finished recordings to `handler`
    pub fn with_completion_handler<H>(
        platform: Platform,
        config: ControllerConfig,
        handler: H,
    ) -> Result<Self>
    where
        H: CompletionHandler + 'static,
    {
        Self::build(platform, config, Some(Arc::new(handler)))
    }

    fn build(
        platform: Platform,
        config: ControllerConfig,
        on_complete: Option<Arc<dyn CompletionHandler>>,
    ) -> Result<Self> {
        config.validate()?;

        let supported = platform.capture.is_supported();
        let session = CaptureSession::new(supported);

        info!(
            "Capture controller ready: backend={}, environment={:?}, supported={}, max={:?}",
            platform.capture.name(),
            platform.environment,
            supported,
            config.max_duration
        );

        Ok(Self {
            shared: Arc::new(Shared {
                status: StatusPublisher::new(session.snapshot()),
                session: Mutex::new(session),
                config,
                platform,
                active: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                on_complete,
            }),
        })
    }

    /// Start a recording
    ///
    /// No-op while a session is active or a start is already outstanding.
    /// Failures are reported through `status().error`.
    pub async fn start_recording(&self) {
        let shared = Arc::clone(&self.shared);
        run_detached(async move { shared.start().await }).await
    }

    /// Stop the active recording and deliver it to the completion handler
    ///
    /// No-op when nothing is recording or a stop is already underway.
    pub async fn stop_recording(&self) {
        let shared = Arc::clone(&self.shared);
        run_detached(async move { shared.stop(StopReason::Manual).await }).await
    }

    /// Stop the active recording (if any) and reset the duration to zero
    ///
    /// Whether the payload reaches the completion handler is governed by
    /// `ControllerConfig::discard_on_cancel`.
    pub async fn cancel_recording(&self) {
        let shared = Arc::clone(&self.shared);
        run_detached(async move { shared.cancel().await }).await
    }

    /// Release the native capture without notifying anyone
    ///
    /// After this returns no status is published and no completion handler
    /// runs. Dropping the controller performs the same work in the
    /// background.
    pub async fn teardown(&self) {
        if let Some(stop) = self.shared.begin_teardown() {
            run_detached(stop).await
        }
    }

    /// Latest published status
    pub fn status(&self) -> CaptureStatus {
        self.shared.status.current()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.shared.status.subscribe()
    }

    /// Synchronous check, current even inside callbacks
    pub fn is_recording(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn is_supported(&self) -> bool {
        self.shared.lock().supported
    }

    /// Query the capability again, e.g. after the host platform changed
    pub fn refresh_support(&self) -> bool {
        let supported = self.shared.platform.capture.is_supported();
        let mut session = self.shared.lock();
        session.supported = supported;
        self.shared.publish(&session);
        supported
    }

    pub fn clear_error(&self) {
        let mut session = self.shared.lock();
        session.last_error = None;
        self.shared.publish(&session);
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.is_disposed()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    pub fn platform(&self) -> &Platform {
        &self.shared.platform
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let Some(stop) = self.shared.begin_teardown() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(stop);
            }
            Err(_) => {
                warn!("Capture controller dropped outside a tokio runtime; native capture left running");
            }
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CaptureSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &CaptureSession) {
        self.status.publish(session.snapshot());
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn check_preconditions(&self, session: &CaptureSession) -> Result<(), CaptureError> {
        if !self.platform.environment.is_native() {
            return Err(CaptureError::EnvironmentUnsupported);
        }
        if !session.supported {
            return Err(CaptureError::CapabilityUnsupported);
        }
        Ok(())
    }

    async fn start(self: &Arc<Self>) {
        if self.is_disposed() {
            debug!("Ignoring start after teardown");
            return;
        }

        {
            let mut session = self.lock();
            if !session.is_quiescent() || self.active.load(Ordering::SeqCst) {
                debug!("Capture already in progress, ignoring start");
                return;
            }
            if let Err(err) = self.check_preconditions(&session) {
                warn!("Refusing to start capture: {}", err);
                session.last_error = Some(err);
                self.publish(&session);
                return;
            }

            session.starting = true;
            session.last_error = None;
            session.elapsed = Duration::ZERO;
            self.publish(&session);
        }

        info!(
            "Starting system audio capture via {}",
            self.platform.capture.name()
        );

        let result = self.platform.capture.start(self.config.max_duration).await;

        let outcome = {
            let mut session = self.lock();
            session.starting = false;

            match result {
                Err(e) => {
                    error!("Failed to start system audio capture: {:#}", e);
                    session.last_error = Some(CaptureError::start_failure(&e));
                    session.reset();
                    self.publish(&session);
                    StartOutcome::Failed
                }
                Ok(()) if self.is_disposed() => StartOutcome::Orphaned,
                Ok(()) => {
                    let generation = session.begin(Instant::now());
                    self.active.store(true, Ordering::SeqCst);
                    session.clock = Some(self.start_clock(generation));
                    self.publish(&session);
                    StartOutcome::Running
                }
            }
        };

        match outcome {
            StartOutcome::Running => info!(
                "System audio capture started (max {:.1}s)",
                self.config.max_duration.as_secs_f64()
            ),
            StartOutcome::Orphaned => {
                warn!("Controller torn down while capture was starting; releasing native capture");
                self.stop_native().await;
            }
            StartOutcome::Failed => {}
        }
    }

    fn start_clock(self: &Arc<Self>, generation: u64) -> Clock {
        let weak = Arc::downgrade(self);
        Clock::start(self.config.tick_interval, move || match weak.upgrade() {
            Some(shared) => shared.on_tick(generation),
            None => ControlFlow::Break(()),
        })
    }

    fn on_tick(self: &Arc<Self>, generation: u64) -> ControlFlow<()> {
        let elapsed = {
            let mut session = self.lock();
            if session.generation != generation
                || session.state != SessionState::Recording
                || !self.active.load(Ordering::SeqCst)
            {
                return ControlFlow::Break(());
            }
            let Some(started_at) = session.started_at else {
                return ControlFlow::Break(());
            };

            session.elapsed = started_at.elapsed();
            self.publish(&session);
            session.elapsed
        };

        if elapsed < self.config.max_duration {
            return ControlFlow::Continue(());
        }

        info!(
            "Max duration reached ({:.1}s), stopping capture",
            elapsed.as_secs_f64()
        );

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.stop(StopReason::MaxDuration).await });
        ControlFlow::Break(())
    }

    async fn stop(self: &Arc<Self>, reason: StopReason) {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("No active capture, ignoring {} stop", reason);
            return;
        }

        // The clock goes before the native call so no tick can fire mid-stop.
        let started_at = {
            let mut session = self.lock();
            session.state = SessionState::Stopping;
            session.cancel_clock();
            self.publish(&session);
            session.started_at
        };

        info!("Stopping system audio capture ({})", reason);

        let result = self.platform.capture.stop().await;

        let mut delivered = None;
        match result {
            Ok(payload) => {
                let duration = started_at.map(|t| t.elapsed());

                if self.is_disposed() {
                    debug!(
                        "Controller torn down during stop; discarding {} bytes",
                        payload.len()
                    );
                } else if reason == StopReason::Cancelled && self.config.discard_on_cancel {
                    info!("Discarding cancelled recording ({} bytes)", payload.len());
                } else {
                    let recording = Recording::new(payload, duration, reason);
                    info!(
                        "Recording {} complete: {} bytes, {:.2}s",
                        recording.id,
                        recording.payload.len(),
                        recording.duration_secs().unwrap_or_default()
                    );
                    let handled = match &self.on_complete {
                        Some(handler) => panic::catch_unwind(AssertUnwindSafe(|| {
                            handler.on_recording_complete(recording)
                        })),
                        None => Ok(()),
                    };
                    match handled {
                        Ok(()) => delivered = duration,
                        Err(cause) => {
                            let detail = panic_message(cause.as_ref());
                            error!("Completion handler panicked: {}", detail);
                            self.lock().last_error =
                                Some(CaptureError::completion_failure(&detail));
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to stop system audio capture: {:#}", e);
                self.lock().last_error = Some(CaptureError::stop_failure(&e));
            }
        }

        let mut session = self.lock();
        if delivered.is_some() {
            session.last_recording = delivered;
        }
        session.reset();
        self.publish(&session);
    }

    async fn cancel(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }

        if self.active.load(Ordering::SeqCst) {
            self.stop(StopReason::Cancelled).await;
        }

        let mut session = self.lock();
        if session.settle_after_cancel() {
            self.publish(&session);
        }
    }

    /// Mark disposed and hand back the native stop to run, if a session was
    /// active. Returns `None` on every call after the first.
    fn begin_teardown(self: &Arc<Self>) -> Option<impl Future<Output = ()> + Send + 'static> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.status.close();

        let was_active = {
            let mut session = self.lock();
            session.cancel_clock();
            let was_active = self.active.swap(false, Ordering::SeqCst);
            if was_active {
                session.state = SessionState::Stopping;
            }
            was_active
        };

        if !was_active {
            debug!("Capture controller torn down with no active capture");
            return None;
        }

        info!("Capture controller torn down while recording; releasing native capture");

        let shared = Arc::clone(self);
        Some(async move {
            shared.stop_native().await;
            shared.lock().reset();
        })
    }

    /// Stop the native capture outside the normal protocol; failures are
    /// logged, never surfaced.
    async fn stop_native(&self) {
        match self.platform.capture.stop().await {
            Ok(payload) => debug!("Discarded {} bytes from released capture", payload.len()),
            Err(e) => error!("Error stopping audio capture on teardown: {:#}", e),
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `fut` on its own task so dropping the caller cannot strand the
/// session mid-transition.
async fn run_detached<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(e) = tokio::spawn(fut).await {
        error!("Capture task failed: {}", e);
    }
}
