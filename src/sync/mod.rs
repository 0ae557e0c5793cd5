//! External sync service
//!
//! Mirrors committed records into the secondary system. Sync never undoes or
//! blocks a primary write: failures are logged with the record id and left
//! for the reconciler to replay.

use crate::error::AssistantError;
use crate::models::{MemoryNote, SyncOutcome, Transaction};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod notion;

pub use notion::NotionClient;

/// Secondary system receiving copies of committed records
#[async_trait]
pub trait MirrorTarget: Send + Sync {
    async fn mirror_transaction(&self, transaction: &Transaction) -> Result<()>;
    async fn mirror_reminder(&self, note: &MemoryNote) -> Result<()>;
}

/// A committed record eligible for mirroring.
#[derive(Debug, Clone)]
pub enum MirrorItem {
    Transaction(Transaction),
    Reminder(MemoryNote),
}

impl MirrorItem {
    pub fn record_id(&self) -> Uuid {
        match self {
            MirrorItem::Transaction(tx) => tx.id,
            MirrorItem::Reminder(note) => note.id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            MirrorItem::Transaction(_) => "transaction",
            MirrorItem::Reminder(_) => "reminder",
        }
    }
}

#[derive(Clone)]
pub struct SyncService {
    target: Option<Arc<dyn MirrorTarget>>,
    timeout: Duration,
}

impl SyncService {
    pub fn new(target: Arc<dyn MirrorTarget>, timeout: Duration) -> Self {
        Self {
            target: Some(target),
            timeout,
        }
    }

    /// No mirror configured: commits skip sync, replays count every item failed.
    pub fn disabled() -> Self {
        Self {
            target: None,
            timeout: Duration::from_secs(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Mirror one record, bounded by the configured timeout.
    pub async fn sync(&self, item: &MirrorItem) -> Result<()> {
        let target = self.target.as_ref().ok_or_else(|| {
            AssistantError::SyncFailure("no mirror target configured".to_string())
        })?;

        let call = async {
            match item {
                MirrorItem::Transaction(tx) => target.mirror_transaction(tx).await,
                MirrorItem::Reminder(note) => target.mirror_reminder(note).await,
            }
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::SyncFailure(format!(
                "mirror call timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// Mirror each item in order. One failure never stops the rest.
    pub async fn sync_all(&self, items: &[MirrorItem]) -> SyncOutcome {
        let mut outcome = SyncOutcome {
            total: items.len(),
            ..SyncOutcome::default()
        };

        for item in items {
            match self.sync(item).await {
                Ok(()) => outcome.success += 1,
                Err(e) => {
                    warn!(
                        record_id = %item.record_id(),
                        kind = item.kind(),
                        error = %e,
                        "Mirror sync failed; record stays in the primary store"
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// Fire-and-forget sync for freshly committed records.
    pub fn dispatch(&self, items: Vec<MirrorItem>) -> SyncHandle {
        if items.is_empty() {
            return SyncHandle::skipped();
        }
        if !self.is_enabled() {
            debug!(records = items.len(), "Mirror disabled; sync skipped");
            return SyncHandle::skipped();
        }

        let service = self.clone();
        let handle = tokio::spawn(async move { service.sync_all(&items).await });

        SyncHandle {
            inner: Some(handle),
        }
    }
}

/// Handle to a dispatched sync. Awaiting it is optional.
#[derive(Debug)]
pub struct SyncHandle {
    inner: Option<JoinHandle<SyncOutcome>>,
}

impl SyncHandle {
    pub fn skipped() -> Self {
        Self { inner: None }
    }

    pub fn is_dispatched(&self) -> bool {
        self.inner.is_some()
    }

    /// Wait for the background sync. A skipped sync reports an empty outcome.
    pub async fn wait(self) -> SyncOutcome {
        match self.inner {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "Sync task aborted");
                SyncOutcome::default()
            }),
            None => SyncOutcome::default(),
        }
    }
}
