//! Topic grammar for the connector's MQTT namespace
//!
//! Topics follow `<prefix>/<clientID>/<kind>/<direction>` where kind is
//! `control` or `data` and direction is `in` or `out` from the broker's
//! perspective ("in" meaning agent to server). The prefix is configurable
//! and may itself contain slashes.

use crate::protocol::messages::ClientId;
use thiserror::Error;

/// Default topic prefix used when the configuration does not override it.
pub const DEFAULT_TOPIC_PREFIX: &str = "redhat/insights";

const CONTROL_SEGMENT: &str = "control";
const DATA_SEGMENT: &str = "data";
const INCOMING_SEGMENT: &str = "in";
const OUTGOING_SEGMENT: &str = "out";

/// Which topic family a frame arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Control,
    Data,
}

/// Topic classification errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("topic does not match the configured prefix: {0}")]
    PrefixMismatch(String),
    #[error("malformed topic: {0}")]
    Malformed(String),
    #[error("empty client id segment in topic: {0}")]
    EmptyClientId(String),
    #[error("unknown topic kind `{kind}` in topic: {topic}")]
    UnknownKind { kind: String, topic: String },
    #[error("unexpected direction `{direction}` in topic: {topic}")]
    UnexpectedDirection { direction: String, topic: String },
}

/// Builds the concrete topics for a client plus the wildcard subscription
/// filters the connector installs at startup.
#[derive(Debug, Clone)]
pub struct TopicBuilder {
    prefix: String,
}

impl TopicBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// Topic an agent publishes control messages on: `<prefix>/<id>/control/in`
    pub fn incoming_control(&self, client_id: &ClientId) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix, client_id, CONTROL_SEGMENT, INCOMING_SEGMENT
        )
    }

    /// Topic the connector publishes control commands on: `<prefix>/<id>/control/out`
    pub fn outgoing_control(&self, client_id: &ClientId) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix, client_id, CONTROL_SEGMENT, OUTGOING_SEGMENT
        )
    }

    /// Topic an agent publishes data messages on: `<prefix>/<id>/data/in`
    pub fn incoming_data(&self, client_id: &ClientId) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix, client_id, DATA_SEGMENT, INCOMING_SEGMENT
        )
    }

    /// Topic the connector publishes data messages on: `<prefix>/<id>/data/out`
    pub fn outgoing_data(&self, client_id: &ClientId) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix, client_id, DATA_SEGMENT, OUTGOING_SEGMENT
        )
    }

    /// Wildcard subscription filter for inbound control traffic.
    pub fn incoming_wildcard_control(&self) -> String {
        format!("{}/+/{}/{}", self.prefix, CONTROL_SEGMENT, INCOMING_SEGMENT)
    }

    /// Wildcard subscription filter for inbound data traffic.
    pub fn incoming_wildcard_data(&self) -> String {
        format!("{}/+/{}/{}", self.prefix, DATA_SEGMENT, INCOMING_SEGMENT)
    }
}

/// Classifies inbound topics and extracts the client id.
#[derive(Debug, Clone)]
pub struct TopicParser {
    prefix_segments: Vec<String>,
}

impl TopicParser {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix_segments: prefix
                .trim_matches('/')
                .split('/')
                .map(str::to_string)
                .collect(),
        }
    }

    /// Classify an inbound topic as control or data and extract the client id.
    ///
    /// The direction segment must be `in`; frames echoed back on `out`
    /// topics are rejected rather than re-processed.
    pub fn parse_incoming(&self, topic: &str) -> Result<(TopicKind, ClientId), TopicError> {
        let segments: Vec<&str> = topic.split('/').collect();

        let expected_len = self.prefix_segments.len() + 3;
        if segments.len() != expected_len {
            return Err(TopicError::Malformed(topic.to_string()));
        }

        for (expected, actual) in self.prefix_segments.iter().zip(&segments) {
            if expected != actual {
                return Err(TopicError::PrefixMismatch(topic.to_string()));
            }
        }

        let client_segment = segments[self.prefix_segments.len()];
        if client_segment.is_empty() {
            return Err(TopicError::EmptyClientId(topic.to_string()));
        }

        let kind = match segments[self.prefix_segments.len() + 1] {
            CONTROL_SEGMENT => TopicKind::Control,
            DATA_SEGMENT => TopicKind::Data,
            other => {
                return Err(TopicError::UnknownKind {
                    kind: other.to_string(),
                    topic: topic.to_string(),
                })
            }
        };

        let direction = segments[self.prefix_segments.len() + 2];
        if direction != INCOMING_SEGMENT {
            return Err(TopicError::UnexpectedDirection {
                direction: direction.to_string(),
                topic: topic.to_string(),
            });
        }

        Ok((kind, ClientId::new(client_segment)))
    }
}
