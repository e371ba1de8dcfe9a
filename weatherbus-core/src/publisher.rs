use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt, time::Duration};
use tracing::{debug, info, instrument};

use crate::error::PublishError;

/// Fire-and-forget publishing of encoded events to a bus topic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand `payload` to the bus once. No delivery acknowledgment is awaited.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError>;
}

/// Core NATS publisher. One connection per process, shared by every cycle.
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, PublishError> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name("weatherbus")
            .connection_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| PublishError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!("Successfully connected to NATS");
        Ok(Self { client })
    }

    /// Flush buffered messages before the process exits.
    pub async fn close(&self) -> Result<(), PublishError> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .map_err(|e| PublishError::Flush(e.to_string()))
    }
}

impl fmt::Debug for NatsPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsPublisher").finish()
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    #[instrument(skip(self, payload), fields(payload_size = payload.len()))]
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| PublishError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Handed event to NATS");
        Ok(())
    }
}
