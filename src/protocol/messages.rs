//! Wire envelopes and domain types for the control and data planes
//!
//! The envelope `Content` field is polymorphic. It is decoded in two
//! passes: the outer envelope carries a raw JSON sub-document, which the
//! dispatcher then decodes into the type selected by `MessageType`. Typed
//! content never leaves this module as an opaque value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Envelope version stamped on every message the connector emits.
pub const PROTOCOL_VERSION: u32 = 1;

pub const MESSAGE_TYPE_CONTROL: &str = "control";
pub const MESSAGE_TYPE_CONNECTION_STATUS: &str = "connection-status";
pub const MESSAGE_TYPE_EVENT: &str = "event";
pub const MESSAGE_TYPE_DATA: &str = "data";

pub const COMMAND_RECONNECT: &str = "reconnect";

/// Dispatcher whose presence gates inventory registration.
pub const PLAYBOOK_WORKER_DISPATCHER: &str = "rhc-worker-playbook";
/// Dispatcher that carries catalog source enrollment fields.
pub const CATALOG_DISPATCHER: &str = "catalog";

const CATALOG_APPLICATION_TYPE: &str = "ApplicationType";
const CATALOG_SOURCE_NAME: &str = "SrcName";
const CATALOG_SOURCE_REF: &str = "SrcRef";
const CATALOG_SOURCE_TYPE: &str = "SrcType";

/// Opaque per-agent identifier, extracted from the MQTT topic path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short account token used for logs and downstream keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rich identity token carrying org/tenant context, opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dispatcher-name to dispatcher-attributes mapping advertised by an agent.
pub type Dispatchers = HashMap<String, Value>;

/// Control-plane envelope (stable wire shape, PascalCase field names).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlEnvelope {
    #[serde(rename = "MessageType")]
    pub message_type: String,
    #[serde(rename = "MessageID")]
    pub message_id: String,
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "Sent")]
    pub sent: DateTime<Utc>,
    #[serde(rename = "Content")]
    pub content: Value,
}

/// Data-plane envelope. The connector builds these for outbound directives;
/// inbound data frames are forwarded as raw bytes without decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataEnvelope {
    #[serde(rename = "MessageType")]
    pub message_type: String,
    #[serde(rename = "MessageID")]
    pub message_id: String,
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "Sent")]
    pub sent: DateTime<Utc>,
    #[serde(rename = "Directive")]
    pub directive: String,
    #[serde(rename = "Metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(rename = "Content")]
    pub content: Value,
}

/// Content of an outbound `control` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandMessageContent {
    #[serde(rename = "Command")]
    pub command: String,
    #[serde(rename = "Arguments")]
    pub arguments: Value,
}

/// Connection state reported by an agent in a `connection-status` message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

/// Content of an inbound `connection-status` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStatusContent {
    pub state: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_facts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatchers: Option<Dispatchers>,
}

/// The tuple handed to the connection registrar on a successful handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredClient {
    pub client_id: ClientId,
    pub account: AccountId,
    pub dispatchers: Option<Dispatchers>,
    pub canonical_facts: Option<Value>,
}

/// The four catalog fields required to enroll a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSource {
    pub application_type: String,
    pub source_name: String,
    pub source_ref: String,
    pub source_type: String,
}

impl CatalogSource {
    /// Extract the catalog fields from a `catalog` dispatcher value.
    /// Returns `None` when any of the four fields is missing or not a string.
    pub fn from_value(catalog: &Value) -> Option<Self> {
        let fields = catalog.as_object()?;
        let get = |key: &str| fields.get(key)?.as_str().map(str::to_string);

        Some(Self {
            application_type: get(CATALOG_APPLICATION_TYPE)?,
            source_name: get(CATALOG_SOURCE_NAME)?,
            source_ref: get(CATALOG_SOURCE_REF)?,
            source_type: get(CATALOG_SOURCE_TYPE)?,
        })
    }
}

/// Decode the outer control envelope; `Content` stays a raw sub-document.
pub fn decode_control_envelope(payload: &[u8]) -> Result<ControlEnvelope, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Decode the `Content` of a `connection-status` envelope.
pub fn decode_connection_status(content: &Value) -> Result<ConnectionStatusContent, serde_json::Error> {
    serde_json::from_value(content.clone())
}

/// Build an outbound control message, minting a fresh message id and
/// timestamp. Returns the id separately so callers can log it.
pub fn build_control_message(
    content: &CommandMessageContent,
) -> Result<(Uuid, ControlEnvelope), serde_json::Error> {
    let message_id = Uuid::new_v4();

    let envelope = ControlEnvelope {
        message_type: MESSAGE_TYPE_CONTROL.to_string(),
        message_id: message_id.to_string(),
        version: PROTOCOL_VERSION,
        sent: Utc::now(),
        content: serde_json::to_value(content)?,
    };

    Ok((message_id, envelope))
}

/// Build a reconnect command instructing the agent to drop the session and
/// retry after `delay` seconds.
pub fn build_reconnect_message(
    delay_seconds: u32,
) -> Result<(Uuid, ControlEnvelope), serde_json::Error> {
    let content = CommandMessageContent {
        command: COMMAND_RECONNECT.to_string(),
        arguments: serde_json::json!({ "delay": delay_seconds }),
    };

    build_control_message(&content)
}

/// Build an outbound data message carrying a directive for an agent.
pub fn build_data_message(
    directive: &str,
    metadata: Option<Value>,
    content: Value,
) -> (Uuid, DataEnvelope) {
    let message_id = Uuid::new_v4();

    let envelope = DataEnvelope {
        message_type: MESSAGE_TYPE_DATA.to_string(),
        message_id: message_id.to_string(),
        version: PROTOCOL_VERSION,
        sent: Utc::now(),
        directive: directive.to_string(),
        metadata,
        content,
    };

    (message_id, envelope)
}
