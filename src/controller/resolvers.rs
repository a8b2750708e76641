//! Account resolver implementations
//!
//! The `fixed` resolver admits every client under a single configured
//! account; the `table` resolver maps client ids through a configured
//! lookup table and rejects clients it does not know.

use super::{AccountResolver, ControllerError};
use crate::protocol::{AccountId, ClientId, Identity};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

fn build_identity(account: &str, org_id: &str) -> Identity {
    Identity::new(
        serde_json::json!({
            "identity": {
                "account_number": account,
                "internal": { "org_id": org_id },
                "type": "System",
            }
        })
        .to_string(),
    )
}

/// Resolves every client to one configured account.
pub struct FixedAccountResolver {
    account: AccountId,
    identity: Identity,
}

impl FixedAccountResolver {
    pub fn new(account: &str, org_id: &str) -> Self {
        Self {
            account: AccountId::new(account),
            identity: build_identity(account, org_id),
        }
    }
}

#[async_trait]
impl AccountResolver for FixedAccountResolver {
    async fn resolve(
        &self,
        client_id: &ClientId,
    ) -> Result<(Identity, AccountId), ControllerError> {
        debug!(client_id = %client_id, account = %self.account, "resolved client to fixed account");
        Ok((self.identity.clone(), self.account.clone()))
    }
}

/// Resolves clients through a configured client-id to account table.
pub struct TableAccountResolver {
    accounts: HashMap<String, String>,
    org_id: String,
}

impl TableAccountResolver {
    pub fn new(accounts: HashMap<String, String>, org_id: &str) -> Self {
        Self {
            accounts,
            org_id: org_id.to_string(),
        }
    }
}

#[async_trait]
impl AccountResolver for TableAccountResolver {
    async fn resolve(
        &self,
        client_id: &ClientId,
    ) -> Result<(Identity, AccountId), ControllerError> {
        let account = self
            .accounts
            .get(client_id.as_str())
            .ok_or_else(|| ControllerError::UnknownClient(client_id.clone()))?;

        debug!(client_id = %client_id, account = %account, "resolved client through account table");

        Ok((
            build_identity(account, &self.org_id),
            AccountId::new(account),
        ))
    }
}
