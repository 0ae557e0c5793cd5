//! Resync reconciler
//!
//! Replays mirror sync for every mirrorable record in the primary store:
//! all transactions plus dated reminders. Runs sequentially and never aborts
//! on a single failure. Existing mirror pages are not looked up, so a replay
//! creates new pages for records that were already mirrored.

use crate::models::SyncOutcome;
use crate::repository::{MemoryRepository, TransactionRepository};
use crate::sync::{MirrorItem, SyncService};
use crate::Result;
use std::sync::Arc;
use tracing::info;

pub struct Reconciler {
    transactions: Arc<dyn TransactionRepository>,
    memories: Arc<dyn MemoryRepository>,
    sync: SyncService,
}

impl Reconciler {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        memories: Arc<dyn MemoryRepository>,
        sync: SyncService,
    ) -> Self {
        Self {
            transactions,
            memories,
            sync,
        }
    }

    /// Only a failure to read the primary store is an error.
    pub async fn resync_all(&self) -> Result<SyncOutcome> {
        let mut items: Vec<MirrorItem> = self
            .transactions
            .list_all()
            .await?
            .into_iter()
            .map(MirrorItem::Transaction)
            .collect();

        items.extend(
            self.memories
                .list_notes()
                .await?
                .into_iter()
                .filter(|note| note.is_mirrorable())
                .map(MirrorItem::Reminder),
        );

        info!(records = items.len(), mirror_enabled = self.sync.is_enabled(), "Resync started");
        let outcome = self.sync.sync_all(&items).await;
        info!(
            total = outcome.total,
            success = outcome.success,
            failed = outcome.failed,
            "Resync finished"
        );

        Ok(outcome)
    }
}
