//! Kafka producer behind the record sink trait
//!
//! One shared producer serves all forwarder tasks; librdkafka preserves
//! per-topic ordering internally. A canceled write during shutdown returns
//! `SinkError::Canceled` so callers can distinguish it from a real produce
//! failure.

use super::{RecordSink, SinkError};
use crate::config::KafkaSection;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct KafkaResponseWriter {
    producer: FutureProducer,
    topic: String,
    shutdown: CancellationToken,
}

impl KafkaResponseWriter {
    pub fn new(cfg: &KafkaSection, shutdown: CancellationToken) -> Result<Self, SinkError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .set("batch.num.messages", cfg.responses_batch_size.to_string())
            .set("batch.size", cfg.responses_batch_bytes.to_string())
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| SinkError::Create(e.to_string()))?;

        info!(
            brokers = %cfg.brokers.join(","),
            topic = %cfg.responses_topic,
            "created kafka response writer"
        );

        Ok(Self {
            producer,
            topic: cfg.responses_topic.clone(),
            shutdown,
        })
    }
}

#[async_trait]
impl RecordSink for KafkaResponseWriter {
    async fn write(
        &self,
        mqtt_topic: &str,
        mqtt_message_id: &str,
        payload: &[u8],
    ) -> Result<(), SinkError> {
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "topic",
                value: Some(mqtt_topic),
            })
            .insert(Header {
                key: "mqtt_message_id",
                value: Some(mqtt_message_id),
            });

        let record = FutureRecord::<(), [u8]>::to(&self.topic)
            .payload(payload)
            .headers(headers);

        tokio::select! {
            _ = self.shutdown.cancelled() => Err(SinkError::Canceled),
            delivery = self.producer.send(record, Timeout::Never) => delivery
                .map(|_| ())
                .map_err(|(err, _)| SinkError::Produce(err.to_string())),
        }
    }
}
