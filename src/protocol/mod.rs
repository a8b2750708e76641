//! Wire protocol: topic grammar and message envelopes

pub mod messages;
pub mod topics;

pub use messages::{
    build_control_message, build_data_message, build_reconnect_message, decode_connection_status,
    decode_control_envelope, AccountId, CatalogSource, ClientId, CommandMessageContent,
    ConnectionStatus, ConnectionStatusContent, ControlEnvelope, DataEnvelope, Dispatchers,
    Identity, RegisteredClient, CATALOG_DISPATCHER, COMMAND_RECONNECT,
    MESSAGE_TYPE_CONNECTION_STATUS, MESSAGE_TYPE_CONTROL, MESSAGE_TYPE_DATA, MESSAGE_TYPE_EVENT,
    PLAYBOOK_WORKER_DISPATCHER, PROTOCOL_VERSION,
};
pub use topics::{TopicBuilder, TopicError, TopicKind, TopicParser, DEFAULT_TOPIC_PREFIX};
