//! edgelink - cloud-to-edge connector
//!
//! Bridges a fleet of long-lived edge agents connected over MQTT to the
//! platform's Kafka event bus and inventory/catalog services.
//!
//! # Overview
//!
//! The connector subscribes to two wildcard topic families. Control frames
//! (`<prefix>/+/control/in`) carry `connection-status` handshakes that
//! drive account resolution, connection registration, inventory recording
//! and catalog source enrollment; a client whose handshake is rejected
//! receives a one-shot reconnect command on its outbound control topic.
//! Data frames (`<prefix>/+/data/in`) are forwarded verbatim to a Kafka
//! topic with the originating MQTT topic and message id as record headers.
//!
//! ```rust,no_run
//! use edgelink::protocol::{TopicBuilder, TopicParser, TopicKind, ClientId};
//!
//! let topics = TopicBuilder::new("redhat/insights");
//! let parser = TopicParser::new("redhat/insights");
//!
//! let outbound = topics.outgoing_control(&ClientId::new("abc"));
//! assert_eq!(outbound, "redhat/insights/abc/control/out");
//!
//! let (kind, client) = parser
//!     .parse_incoming("redhat/insights/abc/data/in")
//!     .unwrap();
//! assert_eq!(kind, TopicKind::Data);
//! assert_eq!(client.as_str(), "abc");
//! ```

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod sink;
pub mod testing;
pub mod transport;

pub use config::ConnectorConfig;
pub use error::{ConnectorError, ConnectorResult};
pub use protocol::*;
