//! Connector configuration
//!
//! Loaded from a TOML file with serde defaults for everything the operator
//! does not override. Secrets (broker credentials, JWT material) are
//! referenced indirectly through environment variable names or file paths
//! and resolved at runtime, never stored in the file.

use crate::protocol::DEFAULT_TOPIC_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level connector configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectorConfig {
    pub mqtt: MqttSection,
    #[serde(default)]
    pub kafka: KafkaSection,
    #[serde(default)]
    pub handshake: HandshakeSection,
    #[serde(default)]
    pub controller: ControllerSection,
}

/// MQTT broker session options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL; schemes mqtt, mqtts, ws and wss are recognized.
    pub broker_address: String,
    /// Topic namespace prefix, may contain slashes.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// MQTT client identifier; generated when absent.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Whether the broker discards session state between connections.
    #[serde(default = "default_true")]
    pub clean_session: bool,
    /// Whether subscriptions are re-submitted on reconnect even when the
    /// broker resumed the prior session.
    #[serde(default)]
    pub resume_subs: bool,
    #[serde(default = "default_qos_one")]
    pub control_subscription_qos: u8,
    #[serde(default = "default_qos_one")]
    pub data_subscription_qos: u8,
    #[serde(default = "default_qos_one")]
    pub control_publish_qos: u8,
    /// Environment variable holding the broker username.
    #[serde(default)]
    pub username_env: Option<String>,
    /// Environment variable holding the broker password.
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default)]
    pub tls_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub tls_key_file: Option<PathBuf>,
    #[serde(default)]
    pub tls_ca_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub tls_skip_verify: bool,
    /// JWT generator used for wss brokers: "static" or "file".
    #[serde(default = "default_jwt_impl")]
    pub jwt_generator_impl: String,
    #[serde(default)]
    pub jwt_token_env: Option<String>,
    #[serde(default)]
    pub jwt_token_file: Option<PathBuf>,
}

/// Kafka producer options for the data-plane sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaSection {
    #[serde(default = "default_kafka_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_responses_topic")]
    pub responses_topic: String,
    #[serde(default = "default_responses_batch_size")]
    pub responses_batch_size: usize,
    #[serde(default = "default_responses_batch_bytes")]
    pub responses_batch_bytes: usize,
}

/// Handshake policy knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeSection {
    /// Back-off in seconds carried by reconnect commands sent to clients
    /// whose handshake was rejected.
    #[serde(default = "default_reconnect_delay")]
    pub invalid_reconnect_delay: u32,
}

/// Pluggable collaborator selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerSection {
    /// "fixed" or "table"
    #[serde(default = "default_impl_fixed")]
    pub account_resolver_impl: String,
    /// "log"
    #[serde(default = "default_impl_log")]
    pub connected_client_recorder_impl: String,
    /// "log"
    #[serde(default = "default_impl_log")]
    pub sources_recorder_impl: String,
    /// Account used by the fixed resolver.
    #[serde(default = "default_account")]
    pub default_account: String,
    /// Org id embedded in generated identities.
    #[serde(default = "default_org_id")]
    pub default_org_id: String,
    /// Client-id to account table used by the table resolver.
    #[serde(default)]
    pub accounts: HashMap<String, String>,
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_qos_one() -> u8 {
    1
}

fn default_jwt_impl() -> String {
    "static".to_string()
}

fn default_kafka_brokers() -> Vec<String> {
    vec!["kafka:29092".to_string()]
}

fn default_responses_topic() -> String {
    "platform.receptor-controller.responses".to_string()
}

fn default_responses_batch_size() -> usize {
    100
}

fn default_responses_batch_bytes() -> usize {
    1_048_576
}

fn default_reconnect_delay() -> u32 {
    30
}

fn default_impl_fixed() -> String {
    "fixed".to_string()
}

fn default_impl_log() -> String {
    "log".to_string()
}

fn default_account() -> String {
    "010101".to_string()
}

fn default_org_id() -> String {
    "000001".to_string()
}

impl Default for KafkaSection {
    fn default() -> Self {
        Self {
            brokers: default_kafka_brokers(),
            responses_topic: default_responses_topic(),
            responses_batch_size: default_responses_batch_size(),
            responses_batch_bytes: default_responses_batch_bytes(),
        }
    }
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            invalid_reconnect_delay: default_reconnect_delay(),
        }
    }
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            account_resolver_impl: default_impl_fixed(),
            connected_client_recorder_impl: default_impl_log(),
            sources_recorder_impl: default_impl_log(),
            default_account: default_account(),
            default_org_id: default_org_id(),
            accounts: HashMap::new(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid QoS value {value} for {option} (must be 0-2)")]
    InvalidQos { option: &'static str, value: u8 },
    #[error("tls_cert_file and tls_key_file must be specified together")]
    UnpairedTlsMaterial,
    #[error("kafka broker list must not be empty")]
    EmptyKafkaBrokers,
}

impl ConnectorConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ConnectorConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_qos("mqtt.control_subscription_qos", self.mqtt.control_subscription_qos)?;
        validate_qos("mqtt.data_subscription_qos", self.mqtt.data_subscription_qos)?;
        validate_qos("mqtt.control_publish_qos", self.mqtt.control_publish_qos)?;

        if self.mqtt.tls_cert_file.is_some() != self.mqtt.tls_key_file.is_some() {
            return Err(ConfigError::UnpairedTlsMaterial);
        }

        if self.kafka.brokers.is_empty() {
            return Err(ConfigError::EmptyKafkaBrokers);
        }

        Ok(())
    }

    /// Broker username resolved from the configured environment variable.
    pub fn mqtt_username(&self) -> Option<String> {
        resolve_env(self.mqtt.username_env.as_deref())
    }

    /// Broker password resolved from the configured environment variable.
    pub fn mqtt_password(&self) -> Option<String> {
        resolve_env(self.mqtt.password_env.as_deref())
    }
}

fn validate_qos(option: &'static str, value: u8) -> Result<(), ConfigError> {
    if value > 2 {
        return Err(ConfigError::InvalidQos { option, value });
    }
    Ok(())
}

fn resolve_env(name: Option<&str>) -> Option<String> {
    name.and_then(|name| std::env::var(name).ok())
}

impl fmt::Display for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mqtt.broker_address: {}", self.mqtt.broker_address)?;
        writeln!(f, "mqtt.topic_prefix: {}", self.mqtt.topic_prefix)?;
        writeln!(f, "mqtt.clean_session: {}", self.mqtt.clean_session)?;
        writeln!(f, "mqtt.resume_subs: {}", self.mqtt.resume_subs)?;
        writeln!(f, "kafka.brokers: {}", self.kafka.brokers.join(","))?;
        writeln!(f, "kafka.responses_topic: {}", self.kafka.responses_topic)?;
        writeln!(
            f,
            "handshake.invalid_reconnect_delay: {}s",
            self.handshake.invalid_reconnect_delay
        )?;
        write!(
            f,
            "controller: resolver={} recorder={} sources={}",
            self.controller.account_resolver_impl,
            self.controller.connected_client_recorder_impl,
            self.controller.sources_recorder_impl
        )
    }
}
