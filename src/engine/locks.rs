//! Keyed per-client locks
//!
//! The broker runtime delivers frames on arbitrary workers, so two
//! `connection-status` frames for the same client can race. A keyed lock
//! table serializes handshakes per client id without stalling the rest of
//! the fleet behind a global lock.

use crate::protocol::ClientId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct ClientLocks {
    inner: Arc<Mutex<HashMap<ClientId, Arc<Mutex<()>>>>>,
}

impl ClientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one client, creating the slot on first use.
    /// The guard is owned so it can be held across await points.
    // TODO: prune slots for clients that have been offline for a long time
    pub async fn acquire(&self, client_id: &ClientId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.inner.lock().await;
            table
                .entry(client_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        slot.lock_owned().await
    }

    /// Number of client slots currently tracked.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
