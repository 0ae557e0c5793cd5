//! In-process fakes shared by the unit tests

use crate::error::AssistantError;
use crate::gemini::{Completion, CompletionRequest, CompletionService};
use crate::models::{MemoryNote, NewMemoryNote, NewTransaction, Transaction};
use crate::repository::{MemoryRepository, TransactionRepository};
use crate::sync::MirrorTarget;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Completion service replaying canned replies in order.
/// Once the script runs out every call fails like an unreachable service.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    finish_reason: String,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCompletion {
    pub fn replying(replies: &[&str]) -> Self {
        Self::replying_with_finish(replies, "STOP")
    }

    pub fn replying_with_finish(replies: &[&str], finish_reason: &str) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            finish_reason: finish_reason.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self::replying(&[])
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .replies
            .lock()
            .map_err(|_| AssistantError::LlmError("script lock poisoned".to_string()))?
            .pop_front();

        match next {
            Some(text) => Ok(Completion {
                text,
                finish_reason: Some(self.finish_reason.clone()),
            }),
            None => Err(AssistantError::ExtractionFailure(
                "connection refused".to_string(),
            )),
        }
    }
}

/// Mirror that records what it received, optionally failing or stalling.
pub struct RecordingMirror {
    mirrored: RwLock<Vec<Uuid>>,
    fail_ids: HashSet<Uuid>,
    fail_all: bool,
    delay: Option<Duration>,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self {
            mirrored: RwLock::new(Vec::new()),
            fail_ids: HashSet::new(),
            fail_all: false,
            delay: None,
        }
    }

    pub fn failing_for(ids: &[Uuid]) -> Self {
        Self {
            fail_ids: ids.iter().copied().collect(),
            ..Self::new()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub async fn mirrored(&self) -> Vec<Uuid> {
        self.mirrored.read().await.clone()
    }

    async fn accept(&self, id: Uuid) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all || self.fail_ids.contains(&id) {
            return Err(AssistantError::SyncFailure(format!("mirror rejected {}", id)));
        }
        self.mirrored.write().await.push(id);
        Ok(())
    }
}

#[async_trait]
impl MirrorTarget for RecordingMirror {
    async fn mirror_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.accept(transaction.id).await
    }

    async fn mirror_reminder(&self, note: &MemoryNote) -> Result<()> {
        self.accept(note.id).await
    }
}

/// Primary store whose writes always fail.
pub struct BrokenStore;

fn store_down() -> AssistantError {
    AssistantError::PersistenceFailure("store unavailable".to_string())
}

#[async_trait]
impl TransactionRepository for BrokenStore {
    async fn save_many(&self, _transactions: Vec<NewTransaction>) -> Result<Vec<Transaction>> {
        Err(store_down())
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Option<Transaction>> {
        Ok(None)
    }

    async fn list_by_period(
        &self,
        _start: Option<NaiveDate>,
        _end: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        Err(store_down())
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        Err(store_down())
    }
}

#[async_trait]
impl MemoryRepository for BrokenStore {
    async fn save_note(&self, _note: NewMemoryNote) -> Result<MemoryNote> {
        Err(store_down())
    }

    async fn get_note(&self, _id: Uuid) -> Result<Option<MemoryNote>> {
        Ok(None)
    }

    async fn list_recent(&self, _limit: usize) -> Result<Vec<MemoryNote>> {
        Err(store_down())
    }

    async fn list_notes(&self) -> Result<Vec<MemoryNote>> {
        Err(store_down())
    }
}
