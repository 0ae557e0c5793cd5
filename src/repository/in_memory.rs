//! In-process primary store, used when no database is configured and in tests

use super::{MemoryRepository, TransactionRepository};
use crate::error::AssistantError;
use crate::models::{MemoryNote, NewMemoryNote, NewTransaction, Transaction};
use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryStore {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
    notes: Arc<RwLock<HashMap<Uuid, MemoryNote>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            notes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn save_many(&self, transactions: Vec<NewTransaction>) -> Result<Vec<Transaction>> {
        let created_at = Utc::now();
        let records: Vec<Transaction> = transactions
            .into_iter()
            .map(|new| {
                let id = new.id.unwrap_or_else(Uuid::new_v4);
                new.into_transaction(id, created_at)
            })
            .collect();

        let mut stored = self.transactions.write().await;

        // Validate the whole batch before touching the map.
        let mut seen = HashSet::new();
        for record in &records {
            if stored.contains_key(&record.id) || !seen.insert(record.id) {
                return Err(AssistantError::PersistenceFailure(format!(
                    "duplicate transaction id {}",
                    record.id
                )));
            }
        }

        for record in &records {
            stored.insert(record.id, record.clone());
        }

        Ok(records)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        Ok(self.transactions.read().await.get(&id).cloned())
    }

    async fn list_by_period(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        let stored = self.transactions.read().await;
        let mut found: Vec<Transaction> = stored
            .values()
            .filter(|tx| start.map_or(true, |s| tx.transaction_date >= s))
            .filter(|tx| end.map_or(true, |e| tx.transaction_date <= e))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.installment_number.cmp(&b.installment_number))
        });
        Ok(found)
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        let mut all: Vec<Transaction> = self.transactions.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(all)
    }
}

#[async_trait]
impl MemoryRepository for InMemoryStore {
    async fn save_note(&self, note: NewMemoryNote) -> Result<MemoryNote> {
        let saved = MemoryNote {
            id: Uuid::new_v4(),
            content: note.content,
            memory_type: note.memory_type,
            tags: note.tags,
            reminder_at: note.reminder_at,
            source: note.source,
            created_at: Utc::now(),
        };

        self.notes.write().await.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<MemoryNote>> {
        Ok(self.notes.read().await.get(&id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryNote>> {
        let mut all = self.list_notes().await?;
        all.truncate(limit);
        Ok(all)
    }

    async fn list_notes(&self) -> Result<Vec<MemoryNote>> {
        let mut all: Vec<MemoryNote> = self.notes.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
