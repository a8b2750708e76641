//! Top-level error type composing the subsystem errors
//!
//! Subsystems carry their own thiserror enums; this type exists so the
//! binary edge can bubble any of them with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("controller error: {0}")]
    Controller(#[from] crate::controller::ControllerError),

    #[error("mqtt transport error: {0}")]
    Mqtt(#[from] crate::transport::MqttError),

    #[error("kafka sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),
}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_subsystem_errors_convert() {
        let err: ConnectorError = ConfigError::EmptyKafkaBrokers.into();
        assert!(matches!(err, ConnectorError::Config(_)));
        assert!(err.to_string().contains("configuration error"));
    }
}
