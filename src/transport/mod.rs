//! Broker transport layer
//!
//! The engine publishes outbound control commands through the
//! [`ControlPublisher`] trait so it can be tested without a broker; the
//! production implementation is a handle onto the shared MQTT client.

pub mod mqtt;

use async_trait::async_trait;

pub use mqtt::{MqttError, MqttHandle, MqttLink, Subscription};

/// Publisher seam for outbound control messages.
#[async_trait]
pub trait ControlPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retained: bool,
        payload: Vec<u8>,
    ) -> Result<(), MqttError>;
}
