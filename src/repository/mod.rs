//! Persistence repositories (primary store)
//!
//! Committed transactions and memory notes live here. Two backends:
//! PostgreSQL when a database URL is configured, otherwise an in-process
//! store. Batch writes are all-or-nothing on both.

use crate::models::{MemoryNote, NewMemoryNote, NewTransaction, Transaction};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persist one transaction and return it with its id.
    async fn save(&self, transaction: NewTransaction) -> Result<Transaction> {
        self.save_many(vec![transaction])
            .await?
            .pop()
            .ok_or_else(|| {
                crate::error::AssistantError::PersistenceFailure(
                    "insert returned no rows".to_string(),
                )
            })
    }

    /// Persist a batch in one write. Either every row lands or none does.
    async fn save_many(&self, transactions: Vec<NewTransaction>) -> Result<Vec<Transaction>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Transaction>>;

    /// Inclusive bounds, oldest first.
    async fn list_by_period(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>>;

    /// Every stored transaction, latest date first.
    async fn list_all(&self) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn save_note(&self, note: NewMemoryNote) -> Result<MemoryNote>;
    async fn get_note(&self, id: Uuid) -> Result<Option<MemoryNote>>;
    /// Newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryNote>>;
    async fn list_notes(&self) -> Result<Vec<MemoryNote>>;
}

/// The two repositories the rest of the crate is handed at startup.
#[derive(Clone)]
pub struct Repositories {
    pub transactions: Arc<dyn TransactionRepository>,
    pub memories: Arc<dyn MemoryRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            transactions: store.clone(),
            memories: store,
        }
    }

    /// Postgres when `database_url` is set, in-process otherwise.
    pub fn connect(database_url: Option<&str>) -> Result<Self> {
        match database_url {
            Some(url) => {
                let store = Arc::new(PgStore::connect_lazy(url)?);
                info!("Primary store backend: postgres");
                Ok(Self {
                    transactions: store.clone(),
                    memories: store,
                })
            }
            None => {
                info!("Primary store backend: in-memory");
                Ok(Self::in_memory())
            }
        }
    }
}
