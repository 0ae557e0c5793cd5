//! Pending-action session store
//!
//! Holds at most one unconfirmed record per user. A newer intake from the
//! same user overwrites the previous one (last write wins); confirm and
//! cancel take it out.

use crate::models::{PendingAction, PendingRecord};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Trait for pending-record storage
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `record` for `user_id`, returning whatever it replaced.
    async fn put(&self, user_id: Uuid, record: PendingRecord) -> Result<Option<PendingAction>>;
    async fn peek(&self, user_id: Uuid) -> Result<Option<PendingAction>>;
    /// Remove and return the pending record, leaving the user with nothing pending.
    async fn take(&self, user_id: Uuid) -> Result<Option<PendingAction>>;
}

/// In-process session store
pub struct InMemorySessionStore {
    pending: Arc<RwLock<HashMap<Uuid, PendingAction>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, user_id: Uuid, record: PendingRecord) -> Result<Option<PendingAction>> {
        let action = PendingAction {
            user_id,
            record,
            created_at: Utc::now(),
        };

        let replaced = self.pending.write().await.insert(user_id, action);

        if let Some(old) = &replaced {
            debug!(
                user_id = %user_id,
                replaced_domain = %old.record.domain(),
                "Pending record overwritten"
            );
        }

        Ok(replaced)
    }

    async fn peek(&self, user_id: Uuid) -> Result<Option<PendingAction>> {
        let pending = self.pending.read().await;
        Ok(pending.get(&user_id).cloned())
    }

    async fn take(&self, user_id: Uuid) -> Result<Option<PendingAction>> {
        let mut pending = self.pending.write().await;
        Ok(pending.remove(&user_id))
    }
}
