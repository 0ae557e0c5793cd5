//! Finance extraction
//!
//! Prompts the completion service for one transaction in a strict JSON shape
//! and hands the payload to the [`FinanceNormalizer`].

use super::{parse_payload, EXTRACTION_TEMPERATURE};
use crate::gemini::{CompletionRequest, CompletionService};
use crate::models::{Extraction, TransactionIntent};
use crate::normalize::FinanceNormalizer;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FinanceExtractor {
    client: Arc<dyn CompletionService>,
    normalizer: FinanceNormalizer,
}

impl FinanceExtractor {
    pub fn new(client: Arc<dyn CompletionService>, normalizer: FinanceNormalizer) -> Self {
        Self { client, normalizer }
    }

    /// Extract a transaction intent, or the fallback record on any failure.
    pub async fn extract(&self, text: &str, today: NaiveDate) -> Extraction<TransactionIntent> {
        match self.try_extract(text, today).await {
            Ok(intent) => {
                debug!(
                    needs_review = intent.needs_review,
                    installments = ?intent.installments_total,
                    "Finance payload extracted"
                );
                Extraction::Extracted(intent)
            }
            Err(e) => {
                warn!(error = %e, "Finance extraction fell back");
                Extraction::Fallback {
                    record: self.normalizer.fallback(text, today),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_extract(&self, text: &str, today: NaiveDate) -> crate::Result<TransactionIntent> {
        let prompt = build_prompt(today);
        let request = CompletionRequest {
            system_instruction: &prompt,
            user_text: text,
            temperature: EXTRACTION_TEMPERATURE,
        };

        let completion = self.client.complete(request).await?;
        let payload = parse_payload(&completion.text)?;

        self.normalizer.normalize(&payload, text, today)
    }
}

/// Fixed instruction describing the exact output schema
fn build_prompt(today: NaiveDate) -> String {
    format!(
        r#"Today is {today}.

You are a personal finance parser for Brazilian Portuguese messages.

Your only job is to turn the user message into STRICT JSON with exactly this shape:

{{
  "description": "short description in Portuguese",
  "amount": number,
  "transaction_type": "income | expense",
  "category": "category in Portuguese",
  "payment_method": "credit | debit | pix | cash | transfer",
  "account": "string or null",
  "installments_total": number or null,
  "transaction_date": "YYYY-MM-DD"
}}

Rules:
- Reply with valid JSON only
- Never explain anything
- Never use emojis
- amount is the TOTAL value of the transaction, never the installment value
- installments_total is null when the purchase is not split ("6x" means 6)
- account is null when no account or card is named
- transaction_date is today when the message has no explicit date"#,
        today = today.format("%Y-%m-%d")
    )
}
