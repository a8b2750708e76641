//! Log-only recorder implementations
//!
//! Stand-ins for the platform inventory and sources services: they record
//! the call in the structured log and report success. The HTTP-backed
//! recorders plug in behind the same traits.

use super::{ConnectedClientRecorder, ControllerError, SourcesRecorder};
use crate::protocol::{AccountId, CatalogSource, ClientId, Identity, RegisteredClient};
use async_trait::async_trait;
use tracing::debug;

pub struct LogConnectedClientRecorder;

#[async_trait]
impl ConnectedClientRecorder for LogConnectedClientRecorder {
    async fn record(
        &self,
        _identity: &Identity,
        client: &RegisteredClient,
    ) -> Result<(), ControllerError> {
        debug!(
            client_id = %client.client_id,
            account = %client.account,
            canonical_facts = ?client.canonical_facts,
            "recording connected client with inventory"
        );
        Ok(())
    }
}

pub struct LogSourcesRecorder;

#[async_trait]
impl SourcesRecorder for LogSourcesRecorder {
    async fn register_source(
        &self,
        _identity: &Identity,
        account: &AccountId,
        client_id: &ClientId,
        source: &CatalogSource,
    ) -> Result<(), ControllerError> {
        debug!(
            client_id = %client_id,
            account = %account,
            source_ref = %source.source_ref,
            source_name = %source.source_name,
            source_type = %source.source_type,
            application_type = %source.application_type,
            "registering catalog source"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_recorders_always_succeed() {
        let client = RegisteredClient {
            client_id: ClientId::new("abc"),
            account: AccountId::new("1"),
            dispatchers: None,
            canonical_facts: None,
        };
        let identity = Identity::new("{}");

        let recorder = LogConnectedClientRecorder;
        assert!(recorder.record(&identity, &client).await.is_ok());

        let sources = LogSourcesRecorder;
        let source = CatalogSource {
            application_type: "A".to_string(),
            source_name: "N".to_string(),
            source_ref: "R".to_string(),
            source_type: "T".to_string(),
        };
        assert!(sources
            .register_source(&identity, &client.account, &client.client_id, &source)
            .await
            .is_ok());
    }
}
