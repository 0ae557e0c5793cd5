//! Memory extraction (notes, ideas, reflections, reminders)

use super::{parse_payload, EXTRACTION_TEMPERATURE};
use crate::gemini::{CompletionRequest, CompletionService};
use crate::models::{Extraction, MemoryRecord};
use crate::normalize::MemoryNormalizer;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MemoryExtractor {
    client: Arc<dyn CompletionService>,
    normalizer: MemoryNormalizer,
    source: String,
}

impl MemoryExtractor {
    /// `source` names the channel the notes arrive from ("telegram", "api").
    pub fn new(
        client: Arc<dyn CompletionService>,
        normalizer: MemoryNormalizer,
        source: impl Into<String>,
    ) -> Self {
        Self {
            client,
            normalizer,
            source: source.into(),
        }
    }

    pub async fn extract(&self, text: &str, today: NaiveDate) -> Extraction<MemoryRecord> {
        match self.try_extract(text, today).await {
            Ok(record) => {
                debug!(memory_type = %record.memory_type, tags = record.tags.len(), "Memory payload extracted");
                Extraction::Extracted(record)
            }
            Err(e) => {
                warn!(error = %e, "Memory extraction fell back");
                Extraction::Fallback {
                    record: self.normalizer.fallback(text, &self.source),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_extract(&self, text: &str, today: NaiveDate) -> crate::Result<MemoryRecord> {
        let prompt = build_prompt(today);
        let request = CompletionRequest {
            system_instruction: &prompt,
            user_text: text,
            temperature: EXTRACTION_TEMPERATURE,
        };

        let completion = self.client.complete(request).await?;
        let payload = parse_payload(&completion.text)?;

        self.normalizer.normalize(&payload, &self.source)
    }
}

fn build_prompt(today: NaiveDate) -> String {
    format!(
        r#"Today is {today}.

You are a text parser for Brazilian Portuguese messages. Your only job is to turn
the user message into STRICT JSON with exactly this shape:

{{
  "memory_type": "note | idea | reflection | reminder",
  "content": "text in Portuguese, without emojis",
  "tags": ["list", "of", "tags", "in", "portuguese"],
  "datetime": "ISO-8601 or null"
}}

Rules:
- Reply with valid JSON only
- Never explain anything
- Never translate the content
- memory_type is ALWAYS in English
- content and tags are ALWAYS in Portuguese
- datetime MUST be null when the message has no date
- When there is a date without a time, use 09:00
- When there are no clear tags, produce 1 to 3 simple tags"#,
        today = today.format("%Y-%m-%d")
    )
}
