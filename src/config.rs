use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::capture::{HostEnvironment, SimulatedCaptureConfig};
use crate::session::ControllerConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub simulator: SimulatorConfig,
    pub nats: Option<NatsConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_duration_secs: f64,
    pub tick_interval_ms: u64,
    pub discard_on_cancel: bool,
    pub environment: HostEnvironment,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub start_latency_ms: u64,
    pub stop_latency_ms: u64,
    pub supported: bool,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_subject_prefix() -> String {
    "capture".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "clip-capture".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7410,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 29.0,
            tick_interval_ms: 100,
            discard_on_cancel: false,
            environment: HostEnvironment::Native,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            start_latency_ms: 0,
            stop_latency_ms: 0,
            supported: true,
        }
    }
}

impl Config {
    /// Load from `path` (any format the `config` crate recognizes, extension
    /// optional) with `CLIP_CAPTURE__SECTION__KEY` environment overrides.
    /// A missing file falls back to defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CLIP_CAPTURE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}

impl CaptureConfig {
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let max_duration = Duration::try_from_secs_f64(self.max_duration_secs)
            .context("capture.max_duration_secs must be a non-negative number")?;

        let config = ControllerConfig {
            max_duration,
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            discard_on_cancel: self.discard_on_cancel,
        };
        config.validate()?;

        Ok(config)
    }
}

impl SimulatorConfig {
    pub fn capture_config(&self) -> SimulatedCaptureConfig {
        SimulatedCaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            start_latency: Duration::from_millis(self.start_latency_ms),
            stop_latency: Duration::from_millis(self.stop_latency_ms),
            supported: self.supported,
        }
    }
}
