//! PostgreSQL backend for the primary store
//!
//! The schema is created lazily on first use. Batch inserts run inside one
//! SQL transaction so an installment series lands whole or not at all.

use super::{MemoryRepository, TransactionRepository};
use crate::error::AssistantError;
use crate::models::{
    MemoryNote, MemoryType, NewMemoryNote, NewTransaction, PaymentMethod, Transaction,
    TransactionType,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "id, description, amount, transaction_type, category, \
     payment_method, account, transaction_date, is_installment, installment_number, \
     installments_total, created_at";

const MEMORY_COLUMNS: &str = "id, content, memory_type, tags, reminder_at, source, created_at";

pub struct PgStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build a pool without opening a connection yet.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| AssistantError::Config(format!("Invalid database URL: {}", e)))?;

        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS transactions (
                      id UUID PRIMARY KEY,
                      description TEXT NOT NULL,
                      amount DOUBLE PRECISION NOT NULL,
                      transaction_type TEXT NOT NULL,
                      category TEXT NOT NULL,
                      payment_method TEXT,
                      account TEXT,
                      transaction_date DATE NOT NULL,
                      is_installment BOOLEAN NOT NULL DEFAULT FALSE,
                      installment_number INTEGER,
                      installments_total INTEGER,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_transactions_date
                    ON transactions (transaction_date);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS memory_notes (
                      id UUID PRIMARY KEY,
                      content TEXT NOT NULL,
                      memory_type TEXT NOT NULL,
                      tags TEXT[] NOT NULL DEFAULT '{}',
                      reminder_at TIMESTAMPTZ,
                      source TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AssistantError::DatabaseError(format!("Failed to initialize schema: {}", e))
            })?;

        Ok(())
    }
}

fn corrupt(column: &str, value: &str) -> AssistantError {
    AssistantError::DatabaseError(format!("Unexpected {} value in store: {}", column, value))
}

fn opt_u32(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    let kind: String = row.try_get("transaction_type")?;
    let method: Option<String> = row.try_get("payment_method")?;

    let payment_method = match method {
        Some(raw) => Some(PaymentMethod::parse(&raw).ok_or_else(|| corrupt("payment_method", &raw))?),
        None => None,
    };

    Ok(Transaction {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
        amount: row.try_get("amount")?,
        transaction_type: TransactionType::parse(&kind)
            .ok_or_else(|| corrupt("transaction_type", &kind))?,
        category: row.try_get("category")?,
        payment_method,
        account: row.try_get("account")?,
        transaction_date: row.try_get("transaction_date")?,
        is_installment: row.try_get("is_installment")?,
        installment_number: opt_u32(row.try_get("installment_number")?),
        installments_total: opt_u32(row.try_get("installments_total")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_note(row: &PgRow) -> Result<MemoryNote> {
    let kind: String = row.try_get("memory_type")?;

    Ok(MemoryNote {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        memory_type: MemoryType::parse(&kind).ok_or_else(|| corrupt("memory_type", &kind))?,
        tags: row.try_get("tags")?,
        reminder_at: row.try_get("reminder_at")?,
        source: row.try_get("source")?,
        created_at: row.try_get("created_at")?,
    })
}

fn write_failure(action: &str, e: sqlx::Error) -> AssistantError {
    error!(error = %e, "{} failed", action);
    AssistantError::PersistenceFailure(format!("{} failed: {}", action, e))
}

#[async_trait]
impl TransactionRepository for PgStore {
    async fn save_many(&self, transactions: Vec<NewTransaction>) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_failure("Begin transaction", e))?;

        let created_at = Utc::now();
        let mut saved = Vec::with_capacity(transactions.len());

        for new in transactions {
            let id = new.id.unwrap_or_else(Uuid::new_v4);
            let record = new.into_transaction(id, created_at);

            sqlx::query(&format!(
                "INSERT INTO transactions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                TRANSACTION_COLUMNS
            ))
            .bind(record.id)
            .bind(&record.description)
            .bind(record.amount)
            .bind(record.transaction_type.as_str())
            .bind(&record.category)
            .bind(record.payment_method.map(|m| m.as_str()))
            .bind(&record.account)
            .bind(record.transaction_date)
            .bind(record.is_installment)
            .bind(record.installment_number.map(|n| n as i32))
            .bind(record.installments_total.map(|n| n as i32))
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_failure("Insert transaction", e))?;

            saved.push(record);
        }

        // Dropping `tx` without commit rolls every insert back.
        tx.commit()
            .await
            .map_err(|e| write_failure("Commit transaction batch", e))?;

        debug!(rows = saved.len(), "Transactions persisted");
        Ok(saved)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.ensure_schema().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn list_by_period(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions \
             WHERE ($1::date IS NULL OR transaction_date >= $1) \
               AND ($2::date IS NULL OR transaction_date <= $2) \
             ORDER BY transaction_date ASC, created_at ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions ORDER BY transaction_date DESC, created_at DESC",
            TRANSACTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }
}

#[async_trait]
impl MemoryRepository for PgStore {
    async fn save_note(&self, note: NewMemoryNote) -> Result<MemoryNote> {
        self.ensure_schema().await?;

        let saved = MemoryNote {
            id: Uuid::new_v4(),
            content: note.content,
            memory_type: note.memory_type,
            tags: note.tags,
            reminder_at: note.reminder_at,
            source: note.source,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO memory_notes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            MEMORY_COLUMNS
        ))
        .bind(saved.id)
        .bind(&saved.content)
        .bind(saved.memory_type.as_str())
        .bind(&saved.tags)
        .bind(saved.reminder_at)
        .bind(&saved.source)
        .bind(saved.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_failure("Insert memory note", e))?;

        Ok(saved)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<MemoryNote>> {
        self.ensure_schema().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM memory_notes WHERE id = $1",
            MEMORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_note).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryNote>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM memory_notes ORDER BY created_at DESC LIMIT $1",
            MEMORY_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_note).collect()
    }

    async fn list_notes(&self) -> Result<Vec<MemoryNote>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM memory_notes ORDER BY created_at DESC",
            MEMORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_note).collect()
    }
}
