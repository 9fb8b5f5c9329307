use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use clip_capture::nats::forward_events;
use clip_capture::{
    create_router, AppState, CaptureController, Config, NatsClient, Platform, Recording,
    RecordingStore, SessionState, SimulatedCapture,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "clip-capture", version, about = "Bounded system-audio capture controller")]
struct Cli {
    /// Config file path (extension optional)
    #[arg(short, long, default_value = "config/clip-capture")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one clip and report the result
    Record {
        /// Stop after this many seconds instead of waiting for the max duration
        #[arg(long)]
        seconds: Option<f64>,

        /// Cancel instead of stopping when --seconds elapses
        #[arg(long, requires = "seconds")]
        cancel: bool,
    },
    /// Serve the HTTP control API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Max duration {:.1}s, tick {}ms, environment {:?}",
        cfg.capture.max_duration_secs, cfg.capture.tick_interval_ms, cfg.capture.environment
    );

    match cli.command {
        Command::Record { seconds, cancel } => record(&cfg, seconds, cancel).await,
        Command::Serve => serve(cfg).await,
    }
}

fn platform(cfg: &Config) -> Platform {
    let capture = Arc::new(SimulatedCapture::new(cfg.simulator.capture_config()));
    Platform::new(cfg.capture.environment, capture)
}

async fn record(cfg: &Config, seconds: Option<f64>, cancel: bool) -> Result<()> {
    let limit = seconds
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("--seconds must be a non-negative number")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = CaptureController::with_completion_handler(
        platform(cfg),
        cfg.capture.controller_config()?,
        move |recording: Recording| {
            let _ = tx.send(recording);
        },
    )?;

    let mut status = controller.subscribe();

    controller.start_recording().await;
    let started = controller.status();
    if !started.is_recording {
        return Err(anyhow!(
            "Recording did not start: {}",
            started.error.unwrap_or_else(|| "unknown error".to_string())
        ));
    }

    // Runs until the controller is back to idle (auto-stop included)
    let progress = async {
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            if snapshot.state == SessionState::Idle {
                break;
            }
            if snapshot.is_recording {
                info!("Recording... {:.1}s", snapshot.duration_secs);
            }
        }
    };

    match limit {
        Some(limit) => {
            tokio::select! {
                _ = progress => {}
                _ = tokio::time::sleep(limit) => {
                    if cancel {
                        controller.cancel_recording().await;
                    } else {
                        controller.stop_recording().await;
                    }
                }
            }
        }
        None => progress.await,
    }

    let finished = controller.status();
    controller.teardown().await;

    if let Some(error) = finished.error {
        warn!("Recording ended with error: {}", error);
    }

    match rx.try_recv() {
        Ok(recording) => info!(
            "Recording {} ({}): {} bytes, {:.2}s",
            recording.id,
            recording.reason,
            recording.payload.len(),
            recording.duration_secs().unwrap_or_default()
        ),
        Err(_) => info!("No recording delivered"),
    }

    Ok(())
}

async fn serve(cfg: Config) -> Result<()> {
    let store = RecordingStore::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<Recording>();

    let forward = cfg.nats.is_some();
    let handler_store = store.clone();
    let controller = Arc::new(CaptureController::with_completion_handler(
        platform(&cfg),
        cfg.capture.controller_config()?,
        move |recording: Recording| {
            if forward {
                let _ = events_tx.send(recording.clone());
            }
            handler_store.store(recording);
        },
    )?);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut forwarder = None;

    if let Some(nats) = &cfg.nats {
        let client = NatsClient::connect(&nats.url, nats.subject_prefix.clone()).await?;
        let status = controller.subscribe();
        let source = cfg.service.name.clone();
        let shutdown_rx = shutdown_tx.subscribe();

        forwarder = Some(tokio::spawn(async move {
            if let Err(e) = forward_events(client, source, status, events_rx, shutdown_rx).await {
                error!("Capture event forwarding failed: {:#}", e);
            }
        }));
    }

    let app = create_router(AppState::new(Arc::clone(&controller), store));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    controller.teardown().await;

    // Flush the last events before the runtime goes away
    if let Some(forwarder) = forwarder {
        let _ = shutdown_tx.send(());
        if let Err(e) = forwarder.await {
            error!("Capture event forwarder task failed: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
