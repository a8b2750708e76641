//! Data-plane forwarding into the record sink
//!
//! Each non-empty data frame is forwarded on an independent task so a slow
//! sink does not stall the broker event loop. A write failure that is not a
//! shutdown cancellation trips the fatal token: the service stops consuming
//! MQTT frames rather than silently lose data.

use super::InboundFrame;
use crate::observability::metrics;
use crate::sink::RecordSink;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

pub struct DataForwarder {
    sink: Arc<dyn RecordSink>,
    fatal: CancellationToken,
}

impl DataForwarder {
    pub fn new(sink: Arc<dyn RecordSink>, fatal: CancellationToken) -> Self {
        Self { sink, fatal }
    }

    pub fn forward(&self, frame: InboundFrame) {
        metrics().data_message_received();

        if frame.payload.is_empty() {
            trace!(topic = %frame.topic, "received an empty data message");
            return;
        }

        let sink = self.sink.clone();
        let fatal = self.fatal.clone();

        tokio::spawn(async move {
            match sink
                .write(&frame.topic, &frame.message_id, &frame.payload)
                .await
            {
                Ok(()) => {
                    metrics().kafka_write_succeeded();
                    debug!(
                        topic = %frame.topic,
                        mqtt_message_id = %frame.message_id,
                        "mqtt message written to kafka"
                    );
                }
                Err(err) if err.is_cancellation() => {
                    // Shutdown in flight; nothing to report.
                }
                Err(err) => {
                    metrics().kafka_write_failed();
                    error!(
                        topic = %frame.topic,
                        mqtt_message_id = %frame.message_id,
                        error = %err,
                        "error writing mqtt message to kafka, stopping message consumption"
                    );
                    fatal.cancel();
                }
            }
        });
    }
}
