//! MQTT broker adapter
//!
//! Split into pure configuration handling ([`connection`]) and the session
//! supervisor that performs I/O ([`client`]).

pub mod client;
pub mod connection;

pub use client::{MqttHandle, MqttLink, Subscription};
pub use connection::{configure_broker_options, qos_from_u8, MqttError};
