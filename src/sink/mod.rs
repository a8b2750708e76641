//! Data-plane record sink
//!
//! The forwarder writes raw MQTT payloads through the [`RecordSink`] trait;
//! the production implementation is a Kafka producer. The trait seam exists
//! so the engine can be exercised without a broker.

pub mod kafka;

use async_trait::async_trait;
use thiserror::Error;

pub use kafka::KafkaResponseWriter;

/// Sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create kafka producer: {0}")]
    Create(String),
    #[error("kafka produce failed: {0}")]
    Produce(String),
    #[error("write canceled during shutdown")]
    Canceled,
}

impl SinkError {
    /// Canceled writes are clean shutdown, not data loss.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SinkError::Canceled)
    }
}

/// One-record-at-a-time sink for inbound data frames.
///
/// Every record carries the originating MQTT topic and message id as
/// headers so downstream consumers can attribute the payload.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(
        &self,
        mqtt_topic: &str,
        mqtt_message_id: &str,
        payload: &[u8],
    ) -> Result<(), SinkError>;
}
