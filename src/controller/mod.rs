//! Collaborator contracts for the control-plane engine
//!
//! The engine composes five pluggable capabilities: account resolution,
//! connection registration, connected-client (inventory) recording,
//! catalog/source registration, and JWT generation for broker auth.
//! Concrete implementations are selected by configuration strings at boot;
//! the engine holds one reference per contract for its lifetime.

pub mod jwt;
pub mod recorders;
pub mod registrar;
pub mod resolvers;

use crate::config::ControllerSection;
use crate::protocol::{AccountId, CatalogSource, ClientId, Identity, RegisteredClient};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use jwt::{FileJwtGenerator, StaticJwtGenerator};
pub use recorders::{LogConnectedClientRecorder, LogSourcesRecorder};
pub use registrar::MemoryConnectionRegistrar;
pub use resolvers::{FixedAccountResolver, TableAccountResolver};

/// Errors surfaced by collaborator implementations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unknown client: {0}")]
    UnknownClient(ClientId),
    #[error("account resolution failed: {0}")]
    Resolution(String),
    #[error("connection registration failed: {0}")]
    Registration(String),
    #[error("inventory recording failed: {0}")]
    Inventory(String),
    #[error("sources registration failed: {0}")]
    Sources(String),
    #[error("token generation failed: {0}")]
    Token(String),
    #[error("unknown {contract} implementation: {selector}")]
    UnknownImpl {
        contract: &'static str,
        selector: String,
    },
}

/// Token handed back by the registrar for a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationToken(pub Uuid);

/// Maps a client id to the account that owns it.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, client_id: &ClientId) -> Result<(Identity, AccountId), ControllerError>;
}

/// Single source of truth for client liveness.
///
/// `register` is idempotent on client id: a second register for the same
/// client replaces the prior record atomically. Unregistering an unknown
/// client is a no-op.
#[async_trait]
pub trait ConnectionRegistrar: Send + Sync {
    async fn register(
        &self,
        client: RegisteredClient,
    ) -> Result<RegistrationToken, ControllerError>;

    async fn unregister(&self, client_id: &ClientId);
}

/// Publishes a connected host to the inventory service.
#[async_trait]
pub trait ConnectedClientRecorder: Send + Sync {
    async fn record(
        &self,
        identity: &Identity,
        client: &RegisteredClient,
    ) -> Result<(), ControllerError>;
}

/// Enrolls a catalog source advertised by an agent.
#[async_trait]
pub trait SourcesRecorder: Send + Sync {
    async fn register_source(
        &self,
        identity: &Identity,
        account: &AccountId,
        client_id: &ClientId,
        source: &CatalogSource,
    ) -> Result<(), ControllerError>;
}

/// Produces the bearer token placed in the broker's HTTP upgrade header.
pub trait JwtGenerator: Send + Sync {
    fn token(&self) -> Result<String, ControllerError>;
}

/// Build the configured account resolver.
pub fn new_account_resolver(
    cfg: &ControllerSection,
) -> Result<Arc<dyn AccountResolver>, ControllerError> {
    match cfg.account_resolver_impl.as_str() {
        "fixed" => Ok(Arc::new(FixedAccountResolver::new(
            &cfg.default_account,
            &cfg.default_org_id,
        ))),
        "table" => Ok(Arc::new(TableAccountResolver::new(
            cfg.accounts.clone(),
            &cfg.default_org_id,
        ))),
        other => Err(ControllerError::UnknownImpl {
            contract: "account resolver",
            selector: other.to_string(),
        }),
    }
}

/// Build the configured connected-client recorder.
pub fn new_connected_client_recorder(
    cfg: &ControllerSection,
) -> Result<Arc<dyn ConnectedClientRecorder>, ControllerError> {
    match cfg.connected_client_recorder_impl.as_str() {
        "log" => Ok(Arc::new(LogConnectedClientRecorder)),
        other => Err(ControllerError::UnknownImpl {
            contract: "connected client recorder",
            selector: other.to_string(),
        }),
    }
}

/// Build the configured sources recorder.
pub fn new_sources_recorder(
    cfg: &ControllerSection,
) -> Result<Arc<dyn SourcesRecorder>, ControllerError> {
    match cfg.sources_recorder_impl.as_str() {
        "log" => Ok(Arc::new(LogSourcesRecorder)),
        other => Err(ControllerError::UnknownImpl {
            contract: "sources recorder",
            selector: other.to_string(),
        }),
    }
}
