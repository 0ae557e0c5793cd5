//! Core data models for the intake pipeline

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Which module a message belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Memory,
    Finance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Credit,
    Debit,
    Pix,
    Cash,
    Transfer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Note,
    Idea,
    Reflection,
    Reminder,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Memory => "memory",
            Domain::Finance => "finance",
        }
    }
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Credit => "credit",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }

    /// Strict parse of a canonical value (storage round-trip).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(PaymentMethod::Credit),
            "debit" => Some(PaymentMethod::Debit),
            "pix" => Some(PaymentMethod::Pix),
            "cash" => Some(PaymentMethod::Cash),
            "transfer" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Note => "note",
            MemoryType::Idea => "idea",
            MemoryType::Reflection => "reflection",
            MemoryType::Reminder => "reminder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(MemoryType::Note),
            "idea" => Some(MemoryType::Idea),
            "reflection" => Some(MemoryType::Reflection),
            "reminder" => Some(MemoryType::Reminder),
            _ => None,
        }
    }
}

//
// ================= Intake records =================
//

/// A financial intent as extracted and normalized, before confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionIntent {
    pub description: String,
    /// Total value of the transaction. `None` when it could not be resolved.
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub payment_method: Option<PaymentMethod>,
    pub account: Option<String>,
    /// Always `None` or `>= 2`.
    pub installments_total: Option<u32>,
    pub date: NaiveDate,
    pub needs_review: bool,
}

/// One dated slice of an installment purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallmentRecord {
    pub id: Uuid,
    pub description: String,
    /// `round(total / installments_total, 2)`; the slices may not sum to the total.
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub payment_method: Option<PaymentMethod>,
    pub account: Option<String>,
    pub installment_number: u32,
    pub installments_total: u32,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    /// Only set when the source text carried an explicit date.
    pub datetime: Option<DateTime<FixedOffset>>,
    pub source: String,
}

/// Outcome of an extraction call. Fallbacks carry the reason they were taken.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Extracted(T),
    Fallback { record: T, reason: String },
}

impl<T> Extraction<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback { .. })
    }

    pub fn record(&self) -> &T {
        match self {
            Extraction::Extracted(record) => record,
            Extraction::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Extraction::Extracted(record) => record,
            Extraction::Fallback { record, .. } => record,
        }
    }
}

//
// ================= Pending actions =================
//

/// The single unconfirmed record a user may hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "domain", content = "record", rename_all = "lowercase")]
pub enum PendingRecord {
    Finance(TransactionIntent),
    Memory(MemoryRecord),
}

impl PendingRecord {
    pub fn domain(&self) -> Domain {
        match self {
            PendingRecord::Finance(_) => Domain::Finance,
            PendingRecord::Memory(_) => Domain::Memory,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub user_id: Uuid,
    pub record: PendingRecord,
    pub created_at: DateTime<Utc>,
}

//
// ================= Persisted records =================
//

/// Transaction row to insert. `id` is kept when already assigned (installments).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTransaction {
    pub id: Option<Uuid>,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub payment_method: Option<PaymentMethod>,
    pub account: Option<String>,
    pub transaction_date: NaiveDate,
    pub installment_number: Option<u32>,
    pub installments_total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub payment_method: Option<PaymentMethod>,
    pub account: Option<String>,
    pub transaction_date: NaiveDate,
    pub is_installment: bool,
    pub installment_number: Option<u32>,
    pub installments_total: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Row for a single-payment intent. The amount must already be validated.
    pub fn single(intent: &TransactionIntent, amount: f64) -> Self {
        Self {
            id: None,
            description: intent.description.clone(),
            amount,
            transaction_type: intent.transaction_type,
            category: intent.category.clone(),
            payment_method: intent.payment_method,
            account: intent.account.clone(),
            transaction_date: intent.date,
            installment_number: None,
            installments_total: None,
        }
    }

    pub fn into_transaction(self, id: Uuid, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            is_installment: self.installment_number.is_some(),
            description: self.description,
            amount: self.amount,
            transaction_type: self.transaction_type,
            category: self.category,
            payment_method: self.payment_method,
            account: self.account,
            transaction_date: self.transaction_date,
            installment_number: self.installment_number,
            installments_total: self.installments_total,
            created_at,
        }
    }
}

impl From<InstallmentRecord> for NewTransaction {
    fn from(record: InstallmentRecord) -> Self {
        Self {
            id: Some(record.id),
            description: record.description,
            amount: record.amount,
            transaction_type: record.transaction_type,
            category: record.category,
            payment_method: record.payment_method,
            account: record.account,
            transaction_date: record.due_date,
            installment_number: Some(record.installment_number),
            installments_total: Some(record.installments_total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMemoryNote {
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub reminder_at: Option<DateTime<Utc>>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryNote {
    pub id: Uuid,
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub reminder_at: Option<DateTime<Utc>>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl From<&MemoryRecord> for NewMemoryNote {
    fn from(record: &MemoryRecord) -> Self {
        Self {
            content: record.content.clone(),
            memory_type: record.memory_type,
            tags: record.tags.clone(),
            reminder_at: record.datetime.map(|dt| dt.with_timezone(&Utc)),
            source: record.source.clone(),
        }
    }
}

impl MemoryNote {
    /// Reminders with a date are the only notes mirrored to the secondary system.
    pub fn is_mirrorable(&self) -> bool {
        self.memory_type == MemoryType::Reminder && self.reminder_at.is_some()
    }
}

//
// ================= Reporting =================
//

/// Aggregate counts of a reconciliation pass. Reported, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PeriodSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

impl PeriodSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let (income, expense) =
            transactions
                .iter()
                .fold((0.0, 0.0), |(inc, exp), tx| match tx.transaction_type {
                    TransactionType::Income => (inc + tx.amount, exp),
                    TransactionType::Expense => (inc, exp + tx.amount),
                });

        Self {
            income,
            expense,
            balance: income - expense,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: TransactionType, amount: f64) -> Transaction {
        NewTransaction {
            id: None,
            description: "x".to_string(),
            amount,
            transaction_type: kind,
            category: "Other".to_string(),
            payment_method: None,
            account: None,
            transaction_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            installment_number: None,
            installments_total: None,
        }
        .into_transaction(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_period_summary_balance() {
        let summary = PeriodSummary::from_transactions(&[
            tx(TransactionType::Income, 5000.0),
            tx(TransactionType::Expense, 45.9),
            tx(TransactionType::Expense, 500.0),
        ]);

        assert_eq!(summary.income, 5000.0);
        assert!((summary.expense - 545.9).abs() < 1e-9);
        assert!((summary.balance - 4454.1).abs() < 1e-9);
    }

    #[test]
    fn test_pending_record_serializes_with_domain_tag() {
        let record = PendingRecord::Memory(MemoryRecord {
            content: "comprar pão".to_string(),
            memory_type: MemoryType::Note,
            tags: vec![],
            datetime: None,
            source: "telegram".to_string(),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["domain"], "memory");
        assert_eq!(json["record"]["memory_type"], "note");
        assert_eq!(record.domain(), Domain::Memory);
    }
}
