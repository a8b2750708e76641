//! MQTT session options assembly
//!
//! Pure configuration handling for the broker session: URL and scheme
//! handling, client id, clean session, credentials, TLS material and the
//! JWT upgrade header for wss brokers. Building options never touches the
//! network.

use crate::config::MqttSection;
use crate::controller::JwtGenerator;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::MqttOptions;
use rumqttc::{TlsConfiguration, Transport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;
use url::Url;

const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid QoS value: {0}")]
    InvalidQos(u8),
    #[error("failed to read TLS material from {path}: {source}")]
    TlsMaterial {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),
}

/// Map a configured 0-2 QoS value onto the protocol type.
pub fn qos_from_u8(qos: u8) -> Result<QoS, MqttError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Assemble broker session options from configuration.
///
/// The JWT generator is consulted per connection attempt through a request
/// modifier, so reconnects pick up fresh tokens.
pub fn configure_broker_options(
    cfg: &MqttSection,
    jwt: Option<Arc<dyn JwtGenerator>>,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&cfg.broker_address)
        .map_err(|_| MqttError::InvalidBrokerUrl(cfg.broker_address.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(cfg.broker_address.clone()))?
        .to_string();

    let scheme = url.scheme().to_ascii_lowercase();

    // Websocket transports take the full URL in place of the host.
    let (endpoint, port) = match scheme.as_str() {
        "mqtt" | "tcp" => (host, url.port().unwrap_or(1883)),
        "mqtts" | "ssl" => (host, url.port().unwrap_or(8883)),
        "ws" => (cfg.broker_address.clone(), url.port().unwrap_or(80)),
        "wss" => (cfg.broker_address.clone(), url.port().unwrap_or(443)),
        other => return Err(MqttError::UnsupportedScheme(other.to_string())),
    };

    let client_id = cfg
        .client_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("edgelink-{}", uuid::Uuid::new_v4()));

    let mut options = MqttOptions::new(client_id, endpoint, port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_clean_start(cfg.clean_session);

    if let Some(username_env) = &cfg.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = cfg
                .password_env
                .as_ref()
                .and_then(|name| std::env::var(name).ok())
                .unwrap_or_default();
            options.set_credentials(&username, &password);
        }
    }

    match scheme.as_str() {
        "mqtts" | "ssl" => {
            options.set_transport(build_tls_transport(cfg, false)?);
        }
        "ws" => {
            options.set_transport(Transport::Ws);
        }
        "wss" => {
            options.set_transport(build_tls_transport(cfg, true)?);
        }
        _ => {}
    }

    if matches!(scheme.as_str(), "wss") {
        if let Some(generator) = jwt {
            options.set_request_modifier(move |mut request: http::Request<()>| {
                let generator = generator.clone();
                async move {
                    match generator.token() {
                        Ok(token) => match http::HeaderValue::from_str(&format!("Bearer {token}")) {
                            Ok(value) => {
                                request
                                    .headers_mut()
                                    .insert(http::header::AUTHORIZATION, value);
                            }
                            Err(err) => {
                                error!(error = %err, "broker token is not a valid header value");
                            }
                        },
                        Err(err) => {
                            error!(error = %err, "unable to generate a token for the broker connection");
                        }
                    }
                    request
                }
            });
        }
    }

    Ok(options)
}

fn build_tls_transport(cfg: &MqttSection, websocket: bool) -> Result<Transport, MqttError> {
    if cfg.tls_skip_verify {
        let config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureServerVerifier))
            .with_no_client_auth();
        let tls = TlsConfiguration::Rustls(Arc::new(config));

        return Ok(if websocket {
            Transport::Wss(tls)
        } else {
            Transport::Tls(tls)
        });
    }

    let client_auth = match (&cfg.tls_cert_file, &cfg.tls_key_file) {
        (Some(cert), Some(key)) => Some((read_tls_file(cert)?, read_tls_file(key)?)),
        _ => None,
    };

    match &cfg.tls_ca_cert_file {
        Some(ca) => {
            let ca = read_tls_file(ca)?;
            Ok(if websocket {
                Transport::wss(ca, client_auth, None)
            } else {
                Transport::tls(ca, client_auth, None)
            })
        }
        // No custom CA: verify against the platform trust store.
        None => Ok(if websocket {
            Transport::wss_with_default_config()
        } else {
            Transport::tls_with_default_config()
        }),
    }
}

fn read_tls_file(path: &Path) -> Result<Vec<u8>, MqttError> {
    std::fs::read(path).map_err(|source| MqttError::TlsMaterial {
        path: path.display().to_string(),
        source,
    })
}

/// Certificate verifier that accepts any broker certificate. Installed only
/// when the operator sets `tls_skip_verify`.
#[derive(Debug)]
struct InsecureServerVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureServerVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        use rustls::SignatureScheme;
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(broker: &str) -> MqttSection {
        MqttSection {
            broker_address: broker.to_string(),
            topic_prefix: "redhat/insights".to_string(),
            client_id: None,
            clean_session: true,
            resume_subs: false,
            control_subscription_qos: 1,
            data_subscription_qos: 1,
            control_publish_qos: 1,
            username_env: None,
            password_env: None,
            tls_cert_file: None,
            tls_key_file: None,
            tls_ca_cert_file: None,
            tls_skip_verify: false,
            jwt_generator_impl: "static".to_string(),
            jwt_token_env: None,
            jwt_token_file: None,
        }
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(qos_from_u8(3), Err(MqttError::InvalidQos(3))));
    }

    #[test]
    fn test_plain_tcp_options() {
        let options = configure_broker_options(&section("mqtt://localhost:1883"), None).unwrap();
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
    }

    #[test]
    fn test_default_ports_per_scheme() {
        let options = configure_broker_options(&section("mqtt://broker"), None).unwrap();
        assert_eq!(options.broker_address().1, 1883);

        let options = configure_broker_options(&section("mqtts://broker"), None).unwrap();
        assert_eq!(options.broker_address().1, 8883);
    }

    #[test]
    fn test_configured_client_id_is_used() {
        let mut cfg = section("mqtt://localhost:1883");
        cfg.client_id = Some("connector-1".to_string());

        let options = configure_broker_options(&cfg, None).unwrap();
        assert_eq!(options.client_id(), "connector-1");
    }

    #[test]
    fn test_generated_client_id_when_absent() {
        let options = configure_broker_options(&section("mqtt://localhost:1883"), None).unwrap();
        assert!(options.client_id().starts_with("edgelink-"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = configure_broker_options(&section("not a url"), None).unwrap_err();
        assert!(matches!(err, MqttError::InvalidBrokerUrl(_)));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let err = configure_broker_options(&section("amqp://localhost"), None).unwrap_err();
        assert!(matches!(err, MqttError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_missing_tls_file_is_reported() {
        let mut cfg = section("mqtts://broker:8883");
        cfg.tls_ca_cert_file = Some("/nonexistent/ca.pem".into());

        let err = configure_broker_options(&cfg, None).unwrap_err();
        assert!(matches!(err, MqttError::TlsMaterial { .. }));
    }

    #[test]
    fn test_skip_verify_builds_options() {
        let mut cfg = section("mqtts://broker:8883");
        cfg.tls_skip_verify = true;

        assert!(configure_broker_options(&cfg, None).is_ok());
    }
}
