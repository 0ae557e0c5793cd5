//! Intake pipeline
//!
//! Text message -> classifier -> domain extractor -> pending record.
//! Every message ends with exactly one pending record for its user, either
//! extracted or a fallback flagged for review.

use crate::classifier::{Classification, IntentClassifier};
use crate::error::AssistantError;
use crate::extraction::{FinanceExtractor, MemoryExtractor};
use crate::models::{Domain, Extraction, PendingRecord};
use crate::session::SessionStore;
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// What the user is asked to confirm.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub classification: ClassificationView,
    pub pending: PendingRecord,
    /// Set when extraction failed and the record is a fallback.
    pub fallback_reason: Option<String>,
    /// A previous unconfirmed record was overwritten.
    pub replaced_previous: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClassificationView {
    pub domain: Domain,
    pub confidence: f32,
}

impl From<Classification> for ClassificationView {
    fn from(c: Classification) -> Self {
        Self {
            domain: c.domain,
            confidence: c.confidence,
        }
    }
}

impl IntakeOutcome {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }

    /// Finance records flagged for review will be refused at confirm.
    /// A memory fallback is still a valid plain note.
    pub fn needs_review(&self) -> bool {
        match &self.pending {
            PendingRecord::Finance(intent) => intent.needs_review,
            PendingRecord::Memory(_) => false,
        }
    }
}

pub struct IntakePipeline {
    classifier: Box<dyn IntentClassifier>,
    finance: FinanceExtractor,
    memory: MemoryExtractor,
    sessions: Arc<dyn SessionStore>,
}

impl IntakePipeline {
    pub fn new(
        classifier: Box<dyn IntentClassifier>,
        finance: FinanceExtractor,
        memory: MemoryExtractor,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            classifier,
            finance,
            memory,
            sessions,
        }
    }

    pub async fn handle_message(
        &self,
        user_id: Uuid,
        text: &str,
        today: NaiveDate,
    ) -> Result<IntakeOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::InvalidInput("message text is empty".to_string()));
        }

        let classification = self.classifier.classify(text).await;

        let (pending, fallback_reason) = match classification.domain {
            Domain::Finance => split(self.finance.extract(text, today).await, PendingRecord::Finance),
            Domain::Memory => split(self.memory.extract(text, today).await, PendingRecord::Memory),
        };

        let replaced = self.sessions.put(user_id, pending.clone()).await?;

        info!(
            user_id = %user_id,
            domain = %classification.domain,
            confidence = classification.confidence,
            fallback = fallback_reason.is_some(),
            replaced_previous = replaced.is_some(),
            "Pending record stored"
        );

        Ok(IntakeOutcome {
            classification: classification.into(),
            pending,
            fallback_reason,
            replaced_previous: replaced.is_some(),
        })
    }
}

fn split<T>(extraction: Extraction<T>, wrap: fn(T) -> PendingRecord) -> (PendingRecord, Option<String>) {
    match extraction {
        Extraction::Extracted(record) => (wrap(record), None),
        Extraction::Fallback { record, reason } => (wrap(record), Some(reason)),
    }
}
