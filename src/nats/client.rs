use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::forwarder::EventSink;
use super::messages::{CaptureStatusMessage, RecordingCompletedMessage};

pub struct NatsClient {
    client: Client,
    subject_prefix: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject_prefix: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject_prefix: subject_prefix.into(),
        })
    }

    pub fn status_subject(&self) -> String {
        format!("{}.status", self.subject_prefix)
    }

    pub fn completed_subject(&self) -> String {
        format!("{}.completed", self.subject_prefix)
    }

    async fn publish_json<T: Serialize>(&self, subject: String, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let bytes = payload.len();

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!("Published {} bytes to {}", bytes, subject);

        Ok(())
    }
}

#[async_trait]
impl EventSink for NatsClient {
    /// Publish a status transition on `<prefix>.status`
    async fn publish_status(&self, message: &CaptureStatusMessage) -> Result<()> {
        self.publish_json(self.status_subject(), message)
            .await
            .context("Failed to publish capture status")
    }

    /// Publish a completed-recording summary on `<prefix>.completed`
    async fn publish_completed(&self, message: &RecordingCompletedMessage) -> Result<()> {
        self.publish_json(self.completed_subject(), message)
            .await
            .context("Failed to publish recording summary")
    }

    async fn close(&self) -> Result<()> {
        info!("Flushing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")
    }
}
