//! Control-plane message engine
//!
//! The broker adapter hands every inbound frame to the [`FrameRouter`],
//! which classifies the topic and routes control frames to the dispatcher
//! and data frames to the forwarder. Frames on unclassifiable topics are
//! logged and dropped; this router is also the catch-all for messages that
//! arrive before subscription setup completes.

pub mod dispatcher;
pub mod forwarder;
pub mod handshake;
pub mod locks;

pub use dispatcher::ControlDispatcher;
pub use forwarder::DataForwarder;
pub use handshake::HandshakeEngine;
pub use locks::ClientLocks;

use crate::protocol::{TopicKind, TopicParser};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// One raw inbound MQTT frame as delivered by the broker adapter.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: Bytes,
    /// Broker-assigned packet id, stringified; 0 for QoS 0 deliveries.
    pub message_id: String,
}

pub struct FrameRouter {
    parser: TopicParser,
    control: Arc<ControlDispatcher>,
    data: Arc<DataForwarder>,
}

impl FrameRouter {
    pub fn new(
        parser: TopicParser,
        control: Arc<ControlDispatcher>,
        data: Arc<DataForwarder>,
    ) -> Self {
        Self {
            parser,
            control,
            data,
        }
    }

    pub async fn route(&self, frame: InboundFrame) {
        match self.parser.parse_incoming(&frame.topic) {
            Ok((TopicKind::Control, client_id)) => {
                self.control.dispatch(client_id, frame).await;
            }
            Ok((TopicKind::Data, _client_id)) => {
                self.data.forward(frame);
            }
            Err(err) => {
                debug!(topic = %frame.topic, error = %err, "failed to verify topic");
            }
        }
    }
}
