//! Configuration loading tests

use edgelink::config::{ConfigError, ConnectorConfig};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp config file");
    write!(file, "{content}").expect("failed to write test config");
    file
}

#[test]
fn test_load_minimal_config() {
    let file = write_config(
        r#"
[mqtt]
broker_address = "mqtt://localhost:1883"
"#,
    );

    let config = ConnectorConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.mqtt.broker_address, "mqtt://localhost:1883");
    assert_eq!(config.mqtt.topic_prefix, "redhat/insights");
    assert_eq!(config.handshake.invalid_reconnect_delay, 30);
    assert_eq!(config.controller.connected_client_recorder_impl, "log");
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[mqtt]
broker_address = "wss://broker.example.com/mqtt"
topic_prefix = "edge/fleet"
client_id = "connector-1"
clean_session = false
resume_subs = true
control_subscription_qos = 1
data_subscription_qos = 0
control_publish_qos = 1
jwt_generator_impl = "file"
jwt_token_file = "/run/secrets/broker-jwt"

[kafka]
brokers = ["k1:9092"]
responses_topic = "platform.edge.responses"

[handshake]
invalid_reconnect_delay = 180

[controller]
account_resolver_impl = "table"

[controller.accounts]
"host-1" = "42"
"#,
    );

    let config = ConnectorConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.mqtt.topic_prefix, "edge/fleet");
    assert!(config.mqtt.resume_subs);
    assert_eq!(config.kafka.responses_topic, "platform.edge.responses");
    assert_eq!(config.handshake.invalid_reconnect_delay, 180);
    assert_eq!(
        config.controller.accounts.get("host-1").map(String::as_str),
        Some("42")
    );
}

#[test]
fn test_missing_file_is_reported() {
    let err = ConnectorConfig::load_from_file(std::path::Path::new("/nonexistent/edgelink.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileRead(_)));
}

#[test]
fn test_invalid_toml_is_reported() {
    let file = write_config("[mqtt\nbroker_address=");
    let err = ConnectorConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)));
}

#[test]
fn test_out_of_range_qos_is_rejected() {
    let file = write_config(
        r#"
[mqtt]
broker_address = "mqtt://localhost:1883"
data_subscription_qos = 7
"#,
    );

    let err = ConnectorConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidQos { value: 7, .. }));
}

#[test]
fn test_key_without_cert_is_rejected() {
    let file = write_config(
        r#"
[mqtt]
broker_address = "mqtts://localhost:8883"
tls_key_file = "/etc/pki/client.key"
"#,
    );

    let err = ConnectorConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnpairedTlsMaterial));
}

#[test]
fn test_unknown_collaborator_selector_fails_at_factory() {
    let file = write_config(
        r#"
[mqtt]
broker_address = "mqtt://localhost:1883"

[controller]
sources_recorder_impl = "http"
"#,
    );

    // Loading succeeds (the selector is just a string) ...
    let config = ConnectorConfig::load_from_file(file.path()).unwrap();
    // ... but building the collaborator fails at boot.
    assert!(edgelink::controller::new_sources_recorder(&config.controller).is_err());
}

#[test]
fn test_roundtrip_through_toml() {
    let file = write_config(
        r#"
[mqtt]
broker_address = "mqtt://localhost:1883"
"#,
    );
    let config = ConnectorConfig::load_from_file(file.path()).unwrap();

    let serialized = toml::to_string_pretty(&config).unwrap();
    let reparsed: ConnectorConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(config, reparsed);
}
