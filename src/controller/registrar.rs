//! In-memory connection registrar
//!
//! Tracks the live connection set in process memory. A durable SQL-backed
//! registrar plugs in behind the same trait.

use super::{ConnectionRegistrar, ControllerError, RegistrationToken};
use crate::protocol::{ClientId, RegisteredClient};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryConnectionRegistrar {
    connections: Mutex<HashMap<ClientId, RegisteredClient>>,
}

impl MemoryConnectionRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the registered record for a client, if any.
    pub async fn get(&self, client_id: &ClientId) -> Option<RegisteredClient> {
        self.connections.lock().await.get(client_id).cloned()
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

#[async_trait]
impl ConnectionRegistrar for MemoryConnectionRegistrar {
    async fn register(
        &self,
        client: RegisteredClient,
    ) -> Result<RegistrationToken, ControllerError> {
        let token = RegistrationToken(Uuid::new_v4());

        let mut connections = self.connections.lock().await;
        // Insert replaces any prior record for the same client atomically.
        connections.insert(client.client_id.clone(), client);

        Ok(token)
    }

    async fn unregister(&self, client_id: &ClientId) {
        let mut connections = self.connections.lock().await;
        if connections.remove(client_id).is_none() {
            debug!(client_id = %client_id, "unregister for a client that was not registered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AccountId;

    fn client(id: &str, account: &str) -> RegisteredClient {
        RegisteredClient {
            client_id: ClientId::new(id),
            account: AccountId::new(account),
            dispatchers: None,
            canonical_facts: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registrar = MemoryConnectionRegistrar::new();

        registrar.register(client("abc", "1")).await.unwrap();

        assert_eq!(registrar.connection_count().await, 1);
        let stored = registrar.get(&ClientId::new("abc")).await.unwrap();
        assert_eq!(stored.account.as_str(), "1");
    }

    #[tokio::test]
    async fn test_register_replaces_prior_record() {
        let registrar = MemoryConnectionRegistrar::new();

        let first = registrar.register(client("abc", "1")).await.unwrap();
        let second = registrar.register(client("abc", "2")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(registrar.connection_count().await, 1);
        let stored = registrar.get(&ClientId::new("abc")).await.unwrap();
        assert_eq!(stored.account.as_str(), "2");
    }

    #[tokio::test]
    async fn test_unregister() {
        let registrar = MemoryConnectionRegistrar::new();

        registrar.register(client("abc", "1")).await.unwrap();
        registrar.unregister(&ClientId::new("abc")).await;

        assert_eq!(registrar.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_unregister_unknown_client_is_noop() {
        let registrar = MemoryConnectionRegistrar::new();
        registrar.unregister(&ClientId::new("ghost")).await;
        assert_eq!(registrar.connection_count().await, 0);
    }
}
