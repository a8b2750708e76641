//! Mock implementations for testing
//!
//! Recording mocks for the five collaborator contracts, the control
//! publisher, and the record sink, so the engine can be exercised without
//! a broker, Kafka, or the platform services.

use crate::controller::{
    AccountResolver, ConnectedClientRecorder, ConnectionRegistrar, ControllerError,
    RegistrationToken, SourcesRecorder,
};
use crate::protocol::{AccountId, CatalogSource, ClientId, Identity, RegisteredClient};
use crate::sink::{RecordSink, SinkError};
use crate::transport::{ControlPublisher, MqttError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Mock account resolver
#[derive(Default)]
pub struct MockAccountResolver {
    pub account: String,
    pub should_fail: bool,
    resolved: Arc<Mutex<Vec<ClientId>>>,
}

impl MockAccountResolver {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            should_fail: false,
            resolved: Arc::default(),
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new("unused")
        }
    }

    pub async fn resolved_clients(&self) -> Vec<ClientId> {
        self.resolved.lock().await.clone()
    }
}

#[async_trait]
impl AccountResolver for MockAccountResolver {
    async fn resolve(
        &self,
        client_id: &ClientId,
    ) -> Result<(Identity, AccountId), ControllerError> {
        self.resolved.lock().await.push(client_id.clone());

        if self.should_fail {
            return Err(ControllerError::UnknownClient(client_id.clone()));
        }

        Ok((
            Identity::new(format!("identity-{}", self.account)),
            AccountId::new(&self.account),
        ))
    }
}

/// Mock connection registrar
#[derive(Default)]
pub struct MockConnectionRegistrar {
    pub should_fail: bool,
    /// Artificial register latency, for exercising per-client ordering.
    pub register_delay: Option<Duration>,
    registered: Arc<Mutex<Vec<RegisteredClient>>>,
    unregistered: Arc<Mutex<Vec<ClientId>>>,
}

impl MockConnectionRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn registered_clients(&self) -> Vec<RegisteredClient> {
        self.registered.lock().await.clone()
    }

    pub async fn unregistered_clients(&self) -> Vec<ClientId> {
        self.unregistered.lock().await.clone()
    }
}

#[async_trait]
impl ConnectionRegistrar for MockConnectionRegistrar {
    async fn register(
        &self,
        client: RegisteredClient,
    ) -> Result<RegistrationToken, ControllerError> {
        if let Some(delay) = self.register_delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail {
            return Err(ControllerError::Registration("mock failure".to_string()));
        }

        self.registered.lock().await.push(client);
        Ok(RegistrationToken(Uuid::new_v4()))
    }

    async fn unregister(&self, client_id: &ClientId) {
        self.unregistered.lock().await.push(client_id.clone());
    }
}

/// Mock connected-client recorder
#[derive(Default)]
pub struct MockConnectedClientRecorder {
    pub should_fail: bool,
    recorded: Arc<Mutex<Vec<(Identity, RegisteredClient)>>>,
}

impl MockConnectedClientRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn recorded_clients(&self) -> Vec<(Identity, RegisteredClient)> {
        self.recorded.lock().await.clone()
    }
}

#[async_trait]
impl ConnectedClientRecorder for MockConnectedClientRecorder {
    async fn record(
        &self,
        identity: &Identity,
        client: &RegisteredClient,
    ) -> Result<(), ControllerError> {
        if self.should_fail {
            return Err(ControllerError::Inventory("mock failure".to_string()));
        }

        self.recorded
            .lock()
            .await
            .push((identity.clone(), client.clone()));
        Ok(())
    }
}

/// Mock sources recorder
#[derive(Default)]
pub struct MockSourcesRecorder {
    pub should_fail: bool,
    sources: Arc<Mutex<Vec<(AccountId, ClientId, CatalogSource)>>>,
}

impl MockSourcesRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn registered_sources(&self) -> Vec<(AccountId, ClientId, CatalogSource)> {
        self.sources.lock().await.clone()
    }
}

#[async_trait]
impl SourcesRecorder for MockSourcesRecorder {
    async fn register_source(
        &self,
        _identity: &Identity,
        account: &AccountId,
        client_id: &ClientId,
        source: &CatalogSource,
    ) -> Result<(), ControllerError> {
        if self.should_fail {
            return Err(ControllerError::Sources("mock failure".to_string()));
        }

        self.sources
            .lock()
            .await
            .push((account.clone(), client_id.clone(), source.clone()));
        Ok(())
    }
}

/// One message captured by the mock publisher.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub qos: u8,
    pub retained: bool,
    pub payload: Vec<u8>,
}

/// Mock control publisher
#[derive(Default)]
pub struct MockControlPublisher {
    pub should_fail: bool,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl MockControlPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl ControlPublisher for MockControlPublisher {
    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retained: bool,
        payload: Vec<u8>,
    ) -> Result<(), MqttError> {
        if self.should_fail {
            return Err(MqttError::PublishFailed("mock failure".to_string().into()));
        }

        self.published.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            qos,
            retained,
            payload,
        });
        Ok(())
    }
}

/// Behavior of the mock record sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    #[default]
    Succeed,
    Fail,
    Canceled,
}

/// One record captured by the mock sink.
#[derive(Debug, Clone)]
pub struct SinkWrite {
    pub topic: String,
    pub message_id: String,
    pub payload: Vec<u8>,
}

/// Mock record sink
#[derive(Default)]
pub struct MockRecordSink {
    pub mode: SinkMode,
    writes: Arc<Mutex<Vec<SinkWrite>>>,
}

impl MockRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: SinkMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub async fn writes(&self) -> Vec<SinkWrite> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MockRecordSink {
    async fn write(
        &self,
        mqtt_topic: &str,
        mqtt_message_id: &str,
        payload: &[u8],
    ) -> Result<(), SinkError> {
        match self.mode {
            SinkMode::Fail => Err(SinkError::Produce("mock failure".to_string())),
            SinkMode::Canceled => Err(SinkError::Canceled),
            SinkMode::Succeed => {
                self.writes.lock().await.push(SinkWrite {
                    topic: mqtt_topic.to_string(),
                    message_id: mqtt_message_id.to_string(),
                    payload: payload.to_vec(),
                });
                Ok(())
            }
        }
    }
}
