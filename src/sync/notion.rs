//! Notion mirror target
//!
//! One page per committed transaction (finance database) or dated reminder
//! (reminders database). The primary id goes into a rich-text property so a
//! page can be found again from the primary store.

use super::MirrorTarget;
use crate::error::AssistantError;
use crate::models::{MemoryNote, Transaction};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

#[derive(Clone)]
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    finance_db_id: Option<String>,
    reminders_db_id: Option<String>,
}

impl NotionClient {
    pub fn new(
        token: String,
        finance_db_id: Option<String>,
        reminders_db_id: Option<String>,
    ) -> Result<Self> {
        Self::with_base_url(token, finance_db_id, reminders_db_id, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        token: String,
        finance_db_id: Option<String>,
        reminders_db_id: Option<String>,
        base_url: &str,
    ) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(AssistantError::Config(
                "NOTION_API_TOKEN is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            finance_db_id,
            reminders_db_id,
        })
    }

    async fn create_page(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/v1/pages", self.base_url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| AssistantError::SyncFailure(format!("Notion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Notion API error response ({}): {}", status, text);
            return Err(AssistantError::SyncFailure(format!(
                "Notion returned {}: {}",
                status, text
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::SyncFailure(format!("Invalid Notion response: {}", e)))
    }
}

#[async_trait]
impl MirrorTarget for NotionClient {
    async fn mirror_transaction(&self, transaction: &Transaction) -> Result<()> {
        let database_id = self.finance_db_id.as_deref().ok_or_else(|| {
            AssistantError::SyncFailure("NOTION_FINANCE_DB_ID not configured".to_string())
        })?;

        let page = self.create_page(&transaction_page(database_id, transaction)).await?;
        debug!(page_id = ?page.get("id"), record_id = %transaction.id, "Transaction mirrored");
        Ok(())
    }

    async fn mirror_reminder(&self, note: &MemoryNote) -> Result<()> {
        let database_id = self.reminders_db_id.as_deref().ok_or_else(|| {
            AssistantError::SyncFailure("NOTION_REMINDERS_DB_ID not configured".to_string())
        })?;

        let page = self.create_page(&reminder_page(database_id, note)).await?;
        debug!(page_id = ?page.get("id"), record_id = %note.id, "Reminder mirrored");
        Ok(())
    }
}

fn title(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": text } }] })
}

fn rich_text(text: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": text } }] })
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn date(start: String) -> Value {
    json!({ "date": { "start": start } })
}

/// Shown in the "Conta" select when no payment method was extracted.
const UNKNOWN_PAYMENT_METHOD: &str = "Não informado";

/// Finance pages use the property names of the existing finance database.
/// Installment position is carried in the title.
pub(crate) fn transaction_page(database_id: &str, tx: &Transaction) -> Value {
    let description = match (tx.installment_number, tx.installments_total) {
        (Some(number), Some(total)) => format!("{} ({}/{})", tx.description, number, total),
        _ => tx.description.clone(),
    };

    let mut props = Map::new();
    props.insert("Transaction ID".into(), rich_text(&tx.id.to_string()));
    props.insert("Descrição".into(), title(&description));
    props.insert("Data".into(), date(tx.transaction_date.format("%Y-%m-%d").to_string()));
    props.insert("Tipo".into(), select(tx.transaction_type.as_str()));
    props.insert("Categoria".into(), select(&tx.category));
    props.insert("Valor".into(), json!({ "number": tx.amount }));
    props.insert(
        "Conta".into(),
        select(tx.payment_method.map_or(UNKNOWN_PAYMENT_METHOD, |m| m.as_str())),
    );
    props.insert("Parcelado".into(), json!({ "checkbox": tx.is_installment }));
    props.insert("Criado em".into(), date(tx.created_at.to_rfc3339()));

    json!({
        "parent": { "database_id": database_id },
        "properties": props,
    })
}

pub(crate) fn reminder_page(database_id: &str, note: &MemoryNote) -> Value {
    let mut props = Map::new();
    props.insert("Title".into(), title(&note.content));
    props.insert("Memory ID".into(), rich_text(&note.id.to_string()));
    props.insert("Source".into(), select(&note.source));
    props.insert(
        "Tags".into(),
        json!({ "multi_select": note.tags.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>() }),
    );

    if let Some(at) = note.reminder_at {
        props.insert("Date".into(), date(at.to_rfc3339()));
    }

    json!({
        "parent": { "database_id": database_id },
        "properties": props,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryType, NewTransaction, PaymentMethod, TransactionType};
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn installment() -> Transaction {
        NewTransaction {
            id: None,
            description: "Notebook".to_string(),
            amount: 500.0,
            transaction_type: TransactionType::Expense,
            category: "Eletrônicos".to_string(),
            payment_method: Some(PaymentMethod::Credit),
            account: Some("Nubank".to_string()),
            transaction_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            installment_number: Some(2),
            installments_total: Some(6),
        }
        .into_transaction(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_transaction_page_properties() {
        let tx = installment();
        let page = transaction_page("finance-db", &tx);
        let props = &page["properties"];

        assert_eq!(page["parent"]["database_id"], "finance-db");
        assert_eq!(props["Descrição"]["title"][0]["text"]["content"], "Notebook (2/6)");
        assert_eq!(
            props["Transaction ID"]["rich_text"][0]["text"]["content"],
            tx.id.to_string()
        );
        assert_eq!(props["Data"]["date"]["start"], "2026-01-20");
        assert_eq!(props["Tipo"]["select"]["name"], "expense");
        assert_eq!(props["Categoria"]["select"]["name"], "Eletrônicos");
        assert_eq!(props["Conta"]["select"]["name"], "credit");
        assert_eq!(props["Valor"]["number"], 500.0);
        assert_eq!(props["Parcelado"]["checkbox"], true);
        assert!(props["Criado em"]["date"]["start"].is_string());
    }

    #[test]
    fn test_transaction_page_uses_only_finance_database_columns() {
        let mut tx = installment();
        tx.payment_method = None;
        tx.installment_number = None;
        tx.installments_total = None;

        let page = transaction_page("finance-db", &tx);
        let props = page["properties"].as_object().unwrap();

        let mut keys: Vec<&str> = props.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "Categoria",
                "Conta",
                "Criado em",
                "Data",
                "Descrição",
                "Parcelado",
                "Tipo",
                "Transaction ID",
                "Valor",
            ]
        );
        assert_eq!(props["Conta"]["select"]["name"], UNKNOWN_PAYMENT_METHOD);
        assert_eq!(props["Descrição"]["title"][0]["text"]["content"], "Notebook");
    }

    #[test]
    fn test_reminder_page_properties() {
        let note = MemoryNote {
            id: Uuid::new_v4(),
            content: "pagar cartão".to_string(),
            memory_type: MemoryType::Reminder,
            tags: vec!["finanças".to_string()],
            reminder_at: Some(Utc.with_ymd_and_hms(2025, 12, 21, 13, 0, 0).unwrap()),
            source: "telegram".to_string(),
            created_at: Utc::now(),
        };

        let page = reminder_page("reminders-db", &note);
        let props = &page["properties"];
        assert_eq!(props["Title"]["title"][0]["text"]["content"], "pagar cartão");
        assert_eq!(props["Memory ID"]["rich_text"][0]["text"]["content"], note.id.to_string());
        assert_eq!(props["Date"]["date"]["start"], "2025-12-21T13:00:00+00:00");
        assert_eq!(props["Tags"]["multi_select"][0]["name"], "finanças");
    }

    #[test]
    fn test_empty_token_is_rejected() {
        assert!(NotionClient::new("  ".to_string(), None, None).is_err());
    }
}
