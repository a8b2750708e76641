//! Handshake orchestration for `connection-status` messages
//!
//! An online handshake walks resolve, register, record, enroll in order.
//! The first three are mandatory: a failure at any of them rejects the
//! client and emits one reconnect command telling it to retry after the
//! configured delay. Source enrollment is best effort. Offline handshakes
//! unregister the client and touch nothing else.

use super::locks::ClientLocks;
use crate::controller::{
    AccountResolver, ConnectedClientRecorder, ConnectionRegistrar, SourcesRecorder,
};
use crate::observability::metrics;
use crate::protocol::{
    build_reconnect_message, AccountId, CatalogSource, ClientId, ConnectionStatus,
    ConnectionStatusContent, Dispatchers, Identity, RegisteredClient, TopicBuilder,
    CATALOG_DISPATCHER, PLAYBOOK_WORKER_DISPATCHER,
};
use crate::transport::ControlPublisher;
use std::sync::Arc;
use tracing::{debug, error};

pub struct HandshakeEngine {
    resolver: Arc<dyn AccountResolver>,
    registrar: Arc<dyn ConnectionRegistrar>,
    recorder: Arc<dyn ConnectedClientRecorder>,
    sources: Arc<dyn SourcesRecorder>,
    publisher: Arc<dyn ControlPublisher>,
    topics: TopicBuilder,
    control_publish_qos: u8,
    reconnect_delay: u32,
    locks: ClientLocks,
}

impl HandshakeEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<dyn AccountResolver>,
        registrar: Arc<dyn ConnectionRegistrar>,
        recorder: Arc<dyn ConnectedClientRecorder>,
        sources: Arc<dyn SourcesRecorder>,
        publisher: Arc<dyn ControlPublisher>,
        topics: TopicBuilder,
        control_publish_qos: u8,
        reconnect_delay: u32,
    ) -> Self {
        Self {
            resolver,
            registrar,
            recorder,
            sources,
            publisher,
            topics,
            control_publish_qos,
            reconnect_delay,
            locks: ClientLocks::new(),
        }
    }

    /// Drive one `connection-status` message through the state machine.
    /// At most one handshake runs per client at any moment.
    pub async fn handle_connection_status(
        &self,
        client_id: &ClientId,
        message_id: &str,
        content: ConnectionStatusContent,
    ) {
        let _guard = self.locks.acquire(client_id).await;

        match content.state {
            ConnectionStatus::Online => self.handle_online(client_id, message_id, content).await,
            ConnectionStatus::Offline => self.handle_offline(client_id, message_id).await,
        }
    }

    async fn handle_online(
        &self,
        client_id: &ClientId,
        message_id: &str,
        content: ConnectionStatusContent,
    ) {
        debug!(client_id = %client_id, message_id, "handling online connection-status message");

        let (identity, account) = match self.resolver.resolve(client_id).await {
            Ok(resolved) => resolved,
            Err(err) => {
                error!(
                    client_id = %client_id,
                    message_id,
                    error = %err,
                    "failed to resolve client id to an account"
                );
                metrics().handshake_failed("authentication");
                self.send_reconnect(client_id, "Authentication failed").await;
                return;
            }
        };

        let client = RegisteredClient {
            client_id: client_id.clone(),
            account: account.clone(),
            dispatchers: content.dispatchers.clone(),
            canonical_facts: content.canonical_facts.clone(),
        };

        if let Err(err) = self.registrar.register(client.clone()).await {
            error!(
                client_id = %client_id,
                account = %account,
                message_id,
                error = %err,
                "failed to register connection"
            );
            metrics().handshake_failed("registration");
            self.send_reconnect(client_id, "Connection registration failed")
                .await;
            return;
        }

        if should_register_with_inventory(&content) {
            if let Err(err) = self.recorder.record(&identity, &client).await {
                error!(
                    client_id = %client_id,
                    account = %account,
                    message_id,
                    error = %err,
                    "failed to record connected client with inventory"
                );
                metrics().handshake_failed("inventory");
                self.send_reconnect(client_id, "rhc connection registration failed")
                    .await;
                return;
            }
        }

        self.enroll_sources(client_id, &content, &identity, &account)
            .await;

        debug!(client_id = %client_id, account = %account, message_id, "client is online");
    }

    async fn handle_offline(&self, client_id: &ClientId, message_id: &str) {
        debug!(client_id = %client_id, message_id, "handling offline connection-status message");
        self.registrar.unregister(client_id).await;
    }

    /// Best-effort catalog enrollment; failures never reject the client.
    async fn enroll_sources(
        &self,
        client_id: &ClientId,
        content: &ConnectionStatusContent,
        identity: &Identity,
        account: &AccountId,
    ) {
        let Some(dispatchers) = content.dispatchers.as_ref() else {
            debug!(client_id = %client_id, "no dispatchers advertised");
            return;
        };

        let Some(catalog) = dispatchers.get(CATALOG_DISPATCHER) else {
            debug!(client_id = %client_id, "no catalog dispatcher advertised");
            return;
        };

        let Some(source) = CatalogSource::from_value(catalog) else {
            debug!(
                client_id = %client_id,
                "catalog dispatcher is missing some of the required fields"
            );
            return;
        };

        if let Err(err) = self
            .sources
            .register_source(identity, account, client_id, &source)
            .await
        {
            metrics().sources_register_failed();
            error!(
                client_id = %client_id,
                account = %account,
                error = %err,
                "failed to register catalog source"
            );
        }
    }

    /// Emit one reconnect command to a client that cannot be admitted.
    /// The publish result is logged; the handshake outcome is not retried.
    async fn send_reconnect(&self, client_id: &ClientId, reason: &str) {
        let (message_id, envelope) = match build_reconnect_message(self.reconnect_delay) {
            Ok(built) => built,
            Err(err) => {
                error!(client_id = %client_id, error = %err, "failed to build reconnect message");
                return;
            }
        };

        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                error!(client_id = %client_id, error = %err, "failed to encode reconnect message");
                return;
            }
        };

        debug!(
            client_id = %client_id,
            message_id = %message_id,
            reason,
            delay = self.reconnect_delay,
            "sending reconnect message to connected client"
        );

        let topic = self.topics.outgoing_control(client_id);
        metrics().reconnect_sent();

        if let Err(err) = self
            .publisher
            .publish(&topic, self.control_publish_qos, false, payload)
            .await
        {
            metrics().publish_failed();
            error!(
                client_id = %client_id,
                message_id = %message_id,
                error = %err,
                "failed to publish reconnect message"
            );
        }
    }
}

/// Inventory registration requires both canonical facts and the playbook
/// worker dispatcher; a host missing either is not useful to inventory.
fn should_register_with_inventory(content: &ConnectionStatusContent) -> bool {
    content.canonical_facts.is_some() && has_playbook_worker(content.dispatchers.as_ref())
}

fn has_playbook_worker(dispatchers: Option<&Dispatchers>) -> bool {
    dispatchers.is_some_and(|d| d.contains_key(PLAYBOOK_WORKER_DISPATCHER))
}
