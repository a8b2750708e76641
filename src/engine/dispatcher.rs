//! Control-plane message dispatch
//!
//! One inbound control frame flows through: counter, empty-payload check,
//! envelope decode, then a branch on `MessageType`. Malformed frames are
//! logged and dropped; there is no error channel back to the agent.

use super::handshake::HandshakeEngine;
use super::InboundFrame;
use crate::observability::metrics;
use crate::protocol::{
    decode_connection_status, decode_control_envelope, ClientId, MESSAGE_TYPE_CONNECTION_STATUS,
    MESSAGE_TYPE_EVENT, PROTOCOL_VERSION,
};
use std::sync::Arc;
use tracing::{debug, error, trace};

pub struct ControlDispatcher {
    handshake: Arc<HandshakeEngine>,
}

impl ControlDispatcher {
    pub fn new(handshake: Arc<HandshakeEngine>) -> Self {
        Self { handshake }
    }

    pub async fn dispatch(&self, client_id: ClientId, frame: InboundFrame) {
        metrics().control_message_received();

        if frame.payload.is_empty() {
            // Retained-message clearing and brokers priming the pump both
            // produce empty frames.
            trace!(client_id = %client_id, topic = %frame.topic, "client sent an empty payload");
            return;
        }

        let envelope = match decode_control_envelope(&frame.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(
                    client_id = %client_id,
                    mqtt_message_id = %frame.message_id,
                    error = %err,
                    "failed to decode control message"
                );
                return;
            }
        };

        if envelope.version != PROTOCOL_VERSION {
            debug!(
                client_id = %client_id,
                message_id = %envelope.message_id,
                version = envelope.version,
                "accepting control message with unrecognized version"
            );
        }

        match envelope.message_type.as_str() {
            MESSAGE_TYPE_CONNECTION_STATUS => {
                let content = match decode_connection_status(&envelope.content) {
                    Ok(content) => content,
                    Err(err) => {
                        error!(
                            client_id = %client_id,
                            message_id = %envelope.message_id,
                            error = %err,
                            "invalid connection-status content"
                        );
                        return;
                    }
                };

                self.handshake
                    .handle_connection_status(&client_id, &envelope.message_id, content)
                    .await;
            }
            MESSAGE_TYPE_EVENT => {
                debug!(
                    client_id = %client_id,
                    message_id = %envelope.message_id,
                    content = %envelope.content,
                    "received an event message"
                );
            }
            other => {
                debug!(
                    client_id = %client_id,
                    message_id = %envelope.message_id,
                    message_type = other,
                    "received an invalid message type"
                );
            }
        }
    }
}
