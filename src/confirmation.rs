//! Confirmation state machine
//!
//! NONE -> PENDING happens at intake. Here the pending record is taken out of
//! the session store first, then either discarded (cancel, or a record that
//! fails commit validation) or committed to the primary store, with
//! installment expansion for split purchases and a background mirror sync.
//! Whatever happens, the user ends with nothing pending.

use crate::error::AssistantError;
use crate::installments;
use crate::models::{
    Domain, MemoryNote, MemoryRecord, NewMemoryNote, NewTransaction, PendingRecord, Transaction,
    TransactionIntent,
};
use crate::repository::{MemoryRepository, TransactionRepository};
use crate::session::SessionStore;
use crate::sync::{MirrorItem, SyncHandle, SyncService};
use crate::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const NOTHING_PENDING_MESSAGE: &str = "Nothing to confirm.";
pub const CANCELLED_MESSAGE: &str = "Operation cancelled.";
pub const RESUBMIT_MESSAGE: &str =
    "Could not save this record. Please send the message again with clearer details.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while saving. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Confirm,
    Cancel,
}

impl FromStr for Action {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "confirm" => Ok(Action::Confirm),
            "cancel" => Ok(Action::Cancel),
            other => Err(AssistantError::InvalidInput(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug)]
pub enum CommittedRecords {
    Transactions(Vec<Transaction>),
    Memory(MemoryNote),
}

#[derive(Debug)]
pub enum ConfirmationOutcome {
    NothingPending,
    Cancelled { domain: Domain },
    /// Commit validation failed; the record was discarded.
    Refused { domain: Domain, reason: String },
    Committed {
        records: CommittedRecords,
        sync: SyncHandle,
    },
}

impl ConfirmationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ConfirmationOutcome::NothingPending => NOTHING_PENDING_MESSAGE,
            ConfirmationOutcome::Cancelled { .. } => CANCELLED_MESSAGE,
            ConfirmationOutcome::Refused { .. } => RESUBMIT_MESSAGE,
            ConfirmationOutcome::Committed {
                records: CommittedRecords::Transactions(rows),
                ..
            } if rows.len() > 1 => "Saved as installments.",
            ConfirmationOutcome::Committed {
                records: CommittedRecords::Transactions(_),
                ..
            } => "Transaction saved.",
            ConfirmationOutcome::Committed {
                records: CommittedRecords::Memory(_),
                ..
            } => "Saved to memory.",
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ConfirmationOutcome::NothingPending => "nothing_pending",
            ConfirmationOutcome::Cancelled { .. } => "cancelled",
            ConfirmationOutcome::Refused { .. } => "refused",
            ConfirmationOutcome::Committed { .. } => "committed",
        }
    }
}

fn refuse<T>(reason: impl Into<String>) -> Result<T> {
    Err(AssistantError::CommitValidationFailure(reason.into()))
}

/// Commit-time checks for a finance intent. Returns the validated amount.
pub fn validate_intent(intent: &TransactionIntent) -> Result<f64> {
    if intent.needs_review {
        return refuse("record is flagged for review");
    }
    let amount = match intent.amount {
        Some(a) if a.is_finite() && a > 0.0 => a,
        Some(a) => return refuse(format!("amount must be positive, got {}", a)),
        None => return refuse("amount is missing"),
    };
    if intent.description.trim().is_empty() {
        return refuse("description is empty");
    }
    if intent.category.trim().is_empty() {
        return refuse("category is empty");
    }
    Ok(amount)
}

pub fn validate_memory(record: &MemoryRecord) -> Result<()> {
    if record.content.trim().is_empty() {
        return refuse("content is empty");
    }
    Ok(())
}

pub struct ConfirmationMachine {
    sessions: Arc<dyn SessionStore>,
    transactions: Arc<dyn TransactionRepository>,
    memories: Arc<dyn MemoryRepository>,
    sync: SyncService,
}

impl ConfirmationMachine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        transactions: Arc<dyn TransactionRepository>,
        memories: Arc<dyn MemoryRepository>,
        sync: SyncService,
    ) -> Self {
        Self {
            sessions,
            transactions,
            memories,
            sync,
        }
    }

    pub async fn confirm(&self, user_id: Uuid, today: NaiveDate) -> Result<ConfirmationOutcome> {
        self.handle(user_id, Action::Confirm, today).await
    }

    pub async fn cancel(&self, user_id: Uuid) -> Result<ConfirmationOutcome> {
        // The date is only used when committing.
        self.handle(user_id, Action::Cancel, NaiveDate::MIN).await
    }

    /// Resolve the user's pending record. `today` is the confirmation date
    /// installment schedules start from.
    pub async fn handle(
        &self,
        user_id: Uuid,
        action: Action,
        today: NaiveDate,
    ) -> Result<ConfirmationOutcome> {
        let Some(pending) = self.sessions.take(user_id).await? else {
            info!(user_id = %user_id, action = ?action, "Nothing pending");
            return Ok(ConfirmationOutcome::NothingPending);
        };

        let domain = pending.record.domain();

        if action == Action::Cancel {
            info!(user_id = %user_id, domain = %domain, "Pending record cancelled");
            return Ok(ConfirmationOutcome::Cancelled { domain });
        }

        let result = match pending.record {
            PendingRecord::Finance(intent) => self.commit_finance(user_id, intent, today).await,
            PendingRecord::Memory(record) => self.commit_memory(user_id, record).await,
        };

        if let Err(e) = &result {
            error!(user_id = %user_id, domain = %domain, error = %e, "Commit failed; pending record dropped");
        }
        result
    }

    async fn commit_finance(
        &self,
        user_id: Uuid,
        intent: TransactionIntent,
        today: NaiveDate,
    ) -> Result<ConfirmationOutcome> {
        let amount = match validate_intent(&intent) {
            Ok(amount) => amount,
            Err(AssistantError::CommitValidationFailure(reason)) => {
                warn!(user_id = %user_id, reason = %reason, "Finance record refused at commit");
                return Ok(ConfirmationOutcome::Refused {
                    domain: Domain::Finance,
                    reason,
                });
            }
            Err(other) => return Err(other),
        };

        let saved = if intent.installments_total.is_some() {
            let rows: Vec<NewTransaction> = installments::generate(&intent, today)?
                .into_iter()
                .map(NewTransaction::from)
                .collect();
            self.transactions.save_many(rows).await?
        } else {
            vec![self.transactions.save(NewTransaction::single(&intent, amount)).await?]
        };

        info!(
            user_id = %user_id,
            rows = saved.len(),
            first_id = %saved.first().map(|t| t.id.to_string()).unwrap_or_default(),
            "Transaction committed"
        );

        let sync = self
            .sync
            .dispatch(saved.iter().cloned().map(MirrorItem::Transaction).collect());

        Ok(ConfirmationOutcome::Committed {
            records: CommittedRecords::Transactions(saved),
            sync,
        })
    }

    async fn commit_memory(&self, user_id: Uuid, record: MemoryRecord) -> Result<ConfirmationOutcome> {
        match validate_memory(&record) {
            Ok(()) => {}
            Err(AssistantError::CommitValidationFailure(reason)) => {
                warn!(user_id = %user_id, reason = %reason, "Memory record refused at commit");
                return Ok(ConfirmationOutcome::Refused {
                    domain: Domain::Memory,
                    reason,
                });
            }
            Err(other) => return Err(other),
        }

        let note = self.memories.save_note(NewMemoryNote::from(&record)).await?;
        info!(user_id = %user_id, record_id = %note.id, memory_type = %note.memory_type, "Memory committed");

        let items = if note.is_mirrorable() {
            vec![MirrorItem::Reminder(note.clone())]
        } else {
            Vec::new()
        };
        let sync = self.sync.dispatch(items);

        Ok(ConfirmationOutcome::Committed {
            records: CommittedRecords::Memory(note),
            sync,
        })
    }
}
