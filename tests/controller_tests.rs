// Integration tests for the capture session controller
//
// These run on tokio's paused clock, so sleeps advance virtual time and
// tick counts are deterministic.

use clip_capture::{
    CaptureController, CaptureErrorKind, ControllerConfig, HostEnvironment, Platform, Recording,
    SessionState, SimulatedCapture, SimulatedCaptureConfig, StopReason,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

struct Harness {
    controller: Arc<CaptureController>,
    capture: Arc<SimulatedCapture>,
    completions: Arc<Mutex<Vec<Recording>>>,
}

impl Harness {
    fn new(config: ControllerConfig, sim: SimulatedCaptureConfig) -> Self {
        Self::with_environment(HostEnvironment::Native, config, sim)
    }

    fn with_environment(
        environment: HostEnvironment,
        config: ControllerConfig,
        sim: SimulatedCaptureConfig,
    ) -> Self {
        let capture = Arc::new(SimulatedCapture::new(sim));
        let completions = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&completions);
        let controller = CaptureController::with_completion_handler(
            Platform::new(environment, capture.clone()),
            config,
            move |recording: Recording| sink.lock().unwrap().push(recording),
        )
        .expect("valid controller config");

        Self {
            controller: Arc::new(controller),
            capture,
            completions,
        }
    }

    fn completions(&self) -> Vec<Recording> {
        self.completions.lock().unwrap().clone()
    }
}

fn default_harness() -> Harness {
    Harness::new(ControllerConfig::default(), SimulatedCaptureConfig::default())
}

fn with_stop_latency(ms: u64) -> SimulatedCaptureConfig {
    SimulatedCaptureConfig {
        stop_latency: Duration::from_millis(ms),
        ..Default::default()
    }
}

fn one_second_max() -> ControllerConfig {
    ControllerConfig {
        max_duration: Duration::from_secs(1),
        ..Default::default()
    }
}

// ============================================================================
// Start preconditions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_browser_environment_refuses_start() {
    let h = Harness::with_environment(
        HostEnvironment::Browser,
        ControllerConfig::default(),
        SimulatedCaptureConfig::default(),
    );

    h.controller.start_recording().await;

    let status = h.controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.error_kind, Some(CaptureErrorKind::EnvironmentUnsupported));
    assert_eq!(
        status.error.as_deref(),
        Some("System audio capture is only available in the desktop app.")
    );
    assert_eq!(h.capture.start_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_capability_refuses_start() {
    let capture = Arc::new(SimulatedCapture::unsupported());
    let controller =
        CaptureController::new(Platform::native(capture.clone()), ControllerConfig::default())
            .unwrap();

    assert!(!controller.is_supported());
    assert!(!controller.status().is_supported);

    controller.start_recording().await;
    sleep(Duration::from_millis(500)).await;

    let status = controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.duration_secs, 0.0);
    assert_eq!(status.error_kind, Some(CaptureErrorKind::CapabilityUnsupported));
    assert_eq!(capture.start_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_leaves_idle_and_allows_retry() {
    let h = default_harness();
    h.capture.fail_next_start("permission denied");

    h.controller.start_recording().await;
    sleep(Duration::from_millis(500)).await;

    let status = h.controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.duration_secs, 0.0, "No clock should run after a failed start");
    assert_eq!(status.error.as_deref(), Some("permission denied"));
    assert_eq!(status.error_kind, Some(CaptureErrorKind::StartFailure));

    h.controller.start_recording().await;

    let status = h.controller.status();
    assert!(status.is_recording);
    assert_eq!(status.error, None, "Error should be cleared on a new attempt");
    assert_eq!(h.capture.start_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_starts_issue_single_native_start() {
    let h = Harness::new(
        ControllerConfig::default(),
        SimulatedCaptureConfig {
            start_latency: Duration::from_millis(200),
            ..Default::default()
        },
    );

    tokio::join!(h.controller.start_recording(), h.controller.start_recording());

    assert!(h.controller.is_recording());
    assert_eq!(h.capture.start_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_recording_is_noop() {
    let h = default_harness();

    h.controller.start_recording().await;
    sleep(Duration::from_millis(300)).await;
    h.controller.start_recording().await;

    let status = h.controller.status();
    assert!(status.is_recording);
    assert!(status.duration_secs > 0.0, "Duration must not reset on a redundant start");
    assert_eq!(h.capture.start_calls(), 1);
}

// ============================================================================
// Duration tracking
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_duration_advances_while_recording() {
    let h = default_harness();

    h.controller.start_recording().await;
    assert!(h.controller.status().is_recording);

    let mut last = 0.0;
    for _ in 0..3 {
        sleep(Duration::from_millis(100)).await;
        let duration = h.controller.status().duration_secs;
        assert!(duration >= last, "Duration went backwards: {} < {}", duration, last);
        last = duration;
    }

    let status = h.controller.status();
    assert!(status.is_recording);
    assert!(
        (status.duration_secs - 0.3).abs() <= 0.1 + 1e-9,
        "Expected ~0.3s, got {}",
        status.duration_secs
    );
}

// ============================================================================
// Auto-stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_auto_stop_fires_exactly_once() {
    let h = Harness::new(one_second_max(), with_stop_latency(300));

    h.controller.start_recording().await;
    sleep(Duration::from_millis(1500)).await;

    let status = h.controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(h.capture.stop_calls(), 1);

    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].reason, StopReason::MaxDuration);
    assert!(completions[0].duration.unwrap() >= Duration::from_secs(1));
    // 1s of 16kHz mono s16le, capped at the max-duration hint
    assert_eq!(completions[0].payload.len(), 32000);
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_during_auto_stop_is_noop() {
    let h = Harness::new(one_second_max(), with_stop_latency(500));

    h.controller.start_recording().await;
    sleep(Duration::from_millis(1200)).await;

    assert_eq!(h.controller.status().state, SessionState::Stopping);
    h.controller.stop_recording().await;

    sleep(Duration::from_secs(1)).await;

    assert_eq!(h.capture.stop_calls(), 1);
    assert_eq!(h.completions().len(), 1);
    assert_eq!(h.completions()[0].reason, StopReason::MaxDuration);
}

#[tokio::test(start_paused = true)]
async fn test_no_ticks_after_stop() {
    let h = default_harness();

    h.controller.start_recording().await;
    sleep(Duration::from_millis(250)).await;
    h.controller.stop_recording().await;

    let mut rx = h.controller.subscribe();
    rx.borrow_and_update();

    sleep(Duration::from_secs(2)).await;

    assert!(!rx.has_changed().unwrap());
    assert_eq!(h.controller.status().duration_secs, 0.0);
}

// ============================================================================
// Manual stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_stop_delivers_recording() {
    let h = default_harness();

    h.controller.start_recording().await;
    sleep(Duration::from_millis(500)).await;
    h.controller.stop_recording().await;

    let status = h.controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.state, SessionState::Idle);
    let last = status.last_recording_secs.unwrap();
    assert!((last - 0.5).abs() < 1e-3, "Expected 0.5s, got {}", last);

    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].reason, StopReason::Manual);
    let secs = completions[0].duration_secs().unwrap();
    assert!((secs - 0.5).abs() < 1e-3);
    // 0.5s of 16kHz mono s16le
    assert!((15_990..=16_000).contains(&completions[0].payload.len()));
}

#[tokio::test(start_paused = true)]
async fn test_double_stop_issues_single_native_stop() {
    let h = Harness::new(ControllerConfig::default(), with_stop_latency(200));

    h.controller.start_recording().await;
    sleep(Duration::from_millis(300)).await;

    tokio::join!(h.controller.stop_recording(), h.controller.stop_recording());

    assert!(!h.controller.is_recording());
    assert_eq!(h.capture.stop_calls(), 1);
    assert_eq!(h.completions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_stops_converge() {
    let h = Harness::new(ControllerConfig::default(), with_stop_latency(100));

    h.controller.start_recording().await;
    sleep(Duration::from_millis(300)).await;

    let stops = (0..5).map(|_| {
        let controller = Arc::clone(&h.controller);
        async move { controller.stop_recording().await }
    });
    futures::future::join_all(stops).await;

    assert_eq!(h.capture.stop_calls(), 1);
    assert_eq!(h.completions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_noop() {
    let h = default_harness();

    h.controller.stop_recording().await;

    assert_eq!(h.capture.stop_calls(), 0);
    assert!(h.completions().is_empty());
    assert_eq!(h.controller.status().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_failure_returns_to_idle_without_completion() {
    let h = default_harness();
    h.capture.fail_stops("device lost");

    h.controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;
    h.controller.stop_recording().await;

    let status = h.controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.error.as_deref(), Some("device lost"));
    assert_eq!(status.error_kind, Some(CaptureErrorKind::StopFailure));
    assert!(h.completions().is_empty());

    // The system is ready for another attempt
    h.capture.clear_failures();
    h.controller.start_recording().await;
    assert!(h.controller.is_recording());
    assert_eq!(h.controller.status().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_returns_to_idle() {
    let capture = Arc::new(SimulatedCapture::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&calls);
    let controller = CaptureController::with_completion_handler(
        Platform::new(HostEnvironment::Native, capture.clone()),
        ControllerConfig::default(),
        move |_recording: Recording| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("consumer exploded");
            }
        },
    )
    .unwrap();

    controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;
    controller.stop_recording().await;

    let status = controller.status();
    assert_eq!(status.state, SessionState::Idle);
    assert!(!status.is_recording);
    assert_eq!(
        status.error.as_deref(),
        Some("Failed to deliver recording: consumer exploded")
    );
    assert_eq!(status.error_kind, Some(CaptureErrorKind::StopFailure));
    assert_eq!(status.last_recording_secs, None);

    // A later cycle works normally
    controller.start_recording().await;
    assert_eq!(capture.start_calls(), 2);
    assert_eq!(controller.status().state, SessionState::Recording);
    assert_eq!(controller.status().error, None);

    sleep(Duration::from_millis(200)).await;
    controller.stop_recording().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(controller.status().state, SessionState::Idle);
    assert_eq!(controller.status().error, None);
}

// ============================================================================
// Cancel
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_completes_keeps_auto_stop() {
    let h = Harness::new(
        one_second_max(),
        SimulatedCaptureConfig {
            start_latency: Duration::from_millis(300),
            ..Default::default()
        },
    );

    let controller = Arc::clone(&h.controller);
    let start = tokio::spawn(async move { controller.start_recording().await });

    sleep(Duration::from_millis(100)).await;
    h.controller.cancel_recording().await;
    start.await.unwrap();

    assert!(h.controller.is_recording());
    assert_eq!(h.capture.stop_calls(), 0);

    // The session started after the cancel still hits its max duration
    sleep(Duration::from_millis(1500)).await;

    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].reason, StopReason::MaxDuration);
    assert_eq!(h.capture.stop_calls(), 1);
    assert_eq!(h.controller.status().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_native_capture_and_resets_duration() {
    let h = default_harness();

    h.controller.start_recording().await;
    sleep(Duration::from_millis(500)).await;
    h.controller.cancel_recording().await;

    let status = h.controller.status();
    assert!(!status.is_recording);
    assert_eq!(status.duration_secs, 0.0);
    assert_eq!(h.capture.stop_calls(), 1);
    assert!(!h.capture.is_capturing());

    // Default policy delivers the payload like a normal stop
    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].reason, StopReason::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_with_discard_drops_payload() {
    let h = Harness::new(
        ControllerConfig {
            discard_on_cancel: true,
            ..Default::default()
        },
        SimulatedCaptureConfig::default(),
    );

    h.controller.start_recording().await;
    sleep(Duration::from_millis(500)).await;
    h.controller.cancel_recording().await;

    assert_eq!(h.capture.stop_calls(), 1);
    assert!(h.completions().is_empty());
    assert_eq!(h.controller.status().last_recording_secs, None);
}

#[tokio::test(start_paused = true)]
async fn test_discard_on_cancel_keeps_manual_stop_delivery() {
    let h = Harness::new(
        ControllerConfig {
            discard_on_cancel: true,
            ..Default::default()
        },
        SimulatedCaptureConfig::default(),
    );

    h.controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;
    h.controller.stop_recording().await;

    assert_eq!(h.completions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_when_idle_is_noop() {
    let h = default_harness();

    h.controller.cancel_recording().await;

    let status = h.controller.status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.duration_secs, 0.0);
    assert_eq!(h.capture.stop_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stop_does_not_stop_twice() {
    let h = Harness::new(ControllerConfig::default(), with_stop_latency(300));

    h.controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;

    tokio::join!(h.controller.stop_recording(), h.controller.cancel_recording());

    assert_eq!(h.capture.stop_calls(), 1);
    assert_eq!(h.completions().len(), 1);
    assert_eq!(h.controller.status().duration_secs, 0.0);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_capture_without_touching_status() {
    let h = default_harness();
    h.capture.fail_stops("device lost");

    h.controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;

    let mut rx = h.controller.subscribe();
    rx.borrow_and_update();

    h.controller.teardown().await;
    sleep(Duration::from_secs(2)).await;

    assert!(h.controller.is_torn_down());
    assert_eq!(h.capture.stop_calls(), 1);
    assert!(h.completions().is_empty());
    assert!(!rx.has_changed().unwrap(), "No status may be published after teardown");
    assert_eq!(h.controller.status().error, None, "Teardown failures are never surfaced");
}

#[tokio::test(start_paused = true)]
async fn test_teardown_is_idempotent() {
    let h = default_harness();

    h.controller.start_recording().await;
    h.controller.teardown().await;
    h.controller.teardown().await;

    assert_eq!(h.capture.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_operations_after_teardown_are_noops() {
    let h = default_harness();

    h.controller.teardown().await;
    h.controller.start_recording().await;
    h.controller.stop_recording().await;
    h.controller.cancel_recording().await;

    assert_eq!(h.capture.start_calls(), 0);
    assert_eq!(h.capture.stop_calls(), 0);
    assert_eq!(h.controller.status().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_native_capture() {
    let h = default_harness();

    h.controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;

    let Harness {
        controller,
        capture,
        completions,
    } = h;
    drop(controller);

    sleep(Duration::from_millis(10)).await;

    assert_eq!(capture.stop_calls(), 1);
    assert!(!capture.is_capturing());
    assert!(completions.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_during_stop_suppresses_completion() {
    let h = Harness::new(ControllerConfig::default(), with_stop_latency(500));

    h.controller.start_recording().await;
    sleep(Duration::from_millis(200)).await;

    let controller = Arc::clone(&h.controller);
    let stop = tokio::spawn(async move { controller.stop_recording().await });

    sleep(Duration::from_millis(100)).await;
    h.controller.teardown().await;
    stop.await.unwrap();

    assert_eq!(h.capture.stop_calls(), 1);
    assert!(h.completions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_during_start_releases_capture() {
    let h = Harness::new(
        ControllerConfig::default(),
        SimulatedCaptureConfig {
            start_latency: Duration::from_millis(300),
            ..Default::default()
        },
    );

    let controller = Arc::clone(&h.controller);
    let start = tokio::spawn(async move { controller.start_recording().await });

    sleep(Duration::from_millis(100)).await;
    h.controller.teardown().await;
    start.await.unwrap();

    assert_eq!(h.capture.start_calls(), 1);
    assert_eq!(h.capture.stop_calls(), 1);
    assert!(!h.capture.is_capturing());
    assert!(!h.controller.is_recording());
}

// ============================================================================
// Status stream
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_subscribers_observe_full_cycle() {
    let h = default_harness();
    let mut rx = h.controller.subscribe();

    h.controller.start_recording().await;
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_recording);

    h.controller.stop_recording().await;
    rx.changed().await.unwrap();

    let status = rx.borrow_and_update().clone();
    assert!(!status.is_recording);
    assert_eq!(status.state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_clear_error() {
    let h = Harness::with_environment(
        HostEnvironment::Browser,
        ControllerConfig::default(),
        SimulatedCaptureConfig::default(),
    );

    h.controller.start_recording().await;
    assert!(h.controller.status().error.is_some());

    h.controller.clear_error();
    assert_eq!(h.controller.status().error, None);
    assert_eq!(h.controller.status().error_kind, None);
}

#[test]
fn test_invalid_config_rejected() {
    let capture = Arc::new(SimulatedCapture::default());
    let config = ControllerConfig {
        max_duration: Duration::ZERO,
        ..Default::default()
    };

    assert!(CaptureController::new(Platform::native(capture), config).is_err());
}
