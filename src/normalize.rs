//! Normalizer / validator for extracted payloads
//!
//! This is the single place where loosely-typed completion output becomes a
//! typed record. Finance payloads are repaired field by field and flagged
//! with `needs_review`; memory payloads are either valid or a schema error.

use crate::error::AssistantError;
use crate::models::{MemoryRecord, MemoryType, PaymentMethod, TransactionIntent, TransactionType};
use crate::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DESCRIPTION_FALLBACK_CHARS: usize = 60;

/// Words in a description that mark money coming in.
const INCOME_CUES: &[&str] = &[
    "recebi", "recebido", "salario", "ganhei", "me pagou", "me pagaram", "rendeu", "reembolso",
];

/// Folded synonym -> canonical payment method
const PAYMENT_SYNONYMS: &[(&str, PaymentMethod)] = &[
    ("credit", PaymentMethod::Credit),
    ("credito", PaymentMethod::Credit),
    ("cartao de credito", PaymentMethod::Credit),
    ("debit", PaymentMethod::Debit),
    ("debito", PaymentMethod::Debit),
    ("cartao de debito", PaymentMethod::Debit),
    ("pix", PaymentMethod::Pix),
    ("cash", PaymentMethod::Cash),
    ("dinheiro", PaymentMethod::Cash),
    ("especie", PaymentMethod::Cash),
    ("transfer", PaymentMethod::Transfer),
    ("transferencia", PaymentMethod::Transfer),
    ("ted", PaymentMethod::Transfer),
    ("doc", PaymentMethod::Transfer),
    ("deposito", PaymentMethod::Transfer),
    ("salario", PaymentMethod::Transfer),
];

/// Strip the Portuguese diacritics we expect in chat text.
pub fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Unmapped values become `None`; raw strings are never passed through.
pub fn map_payment_method(raw: &str) -> Option<PaymentMethod> {
    let folded = fold_accents(&raw.trim().to_lowercase());
    PAYMENT_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == folded)
        .map(|(_, method)| *method)
}

/// Coerce a JSON value into a finite, non-negative total.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount_text(s),
        _ => None,
    }?;

    if parsed.is_finite() {
        Some(parsed.abs())
    } else {
        None
    }
}

fn parse_amount_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .trim_start_matches("r$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let canonical = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // 1.234,56
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        // 1,234.56
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        // 45,90
        (Some(_), None) => cleaned.replace(',', "."),
        // 3.000 / 1.250.000 are thousands groups, 12.50 is a decimal
        (None, Some(_)) => {
            let mut groups = cleaned.split('.');
            let head = groups.next().unwrap_or_default();
            let tail: Vec<&str> = groups.collect();
            if !head.is_empty() && tail.iter().all(|g| g.len() == 3) {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    canonical.parse::<f64>().ok()
}

fn non_empty_str<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

fn parse_installments(value: Option<&Value>) -> Option<u32> {
    let count = match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().trim_end_matches(['x', 'X']).parse::<u64>().ok(),
        _ => None,
    }?;

    u32::try_from(count).ok().filter(|n| *n >= 2)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

//
// ================= Finance =================
//

#[derive(Debug, Clone, Copy, Default)]
pub struct FinanceNormalizer {
    income_forces_transfer: bool,
}

impl FinanceNormalizer {
    pub fn new(income_forces_transfer: bool) -> Self {
        Self {
            income_forces_transfer,
        }
    }

    /// Repair an extracted payload. Only a non-object payload is a schema error.
    pub fn normalize(
        &self,
        raw: &Value,
        source_text: &str,
        today: NaiveDate,
    ) -> Result<TransactionIntent> {
        let data = raw.as_object().ok_or_else(|| {
            AssistantError::ValidationFailure("finance payload is not a JSON object".to_string())
        })?;

        let mut needs_review = false;

        let description = match non_empty_str(data, "description") {
            Some(d) => d.to_string(),
            None => {
                needs_review = true;
                truncate_chars(source_text, DESCRIPTION_FALLBACK_CHARS)
            }
        };

        let amount = data.get("amount").and_then(parse_amount).filter(|a| *a > 0.0);
        if amount.is_none() {
            needs_review = true;
        }

        let raw_type = non_empty_str(data, "transaction_type").or_else(|| non_empty_str(data, "type"));
        let transaction_type = match raw_type.and_then(TransactionType::parse) {
            Some(t) => t,
            None => {
                needs_review = true;
                if has_income_cue(&description) {
                    TransactionType::Income
                } else {
                    TransactionType::Expense
                }
            }
        };

        let category = match non_empty_str(data, "category") {
            Some(c) => c.to_string(),
            None => {
                needs_review = true;
                DEFAULT_CATEGORY.to_string()
            }
        };

        let mut payment_method = non_empty_str(data, "payment_method").and_then(map_payment_method);
        if self.income_forces_transfer && transaction_type == TransactionType::Income {
            payment_method = Some(PaymentMethod::Transfer);
        }

        let account = non_empty_str(data, "account").map(str::to_string);
        let installments_total = parse_installments(data.get("installments_total"));

        let date = match non_empty_str(data, "transaction_date").or_else(|| non_empty_str(data, "date")) {
            None => today,
            Some(raw_date) => parse_date(raw_date).unwrap_or_else(|| {
                needs_review = true;
                today
            }),
        };

        Ok(TransactionIntent {
            description,
            amount,
            transaction_type,
            category,
            payment_method,
            account,
            installments_total,
            date,
            needs_review,
        })
    }

    /// Record used whenever extraction cannot produce anything usable.
    pub fn fallback(&self, source_text: &str, today: NaiveDate) -> TransactionIntent {
        TransactionIntent {
            description: truncate_chars(source_text, DESCRIPTION_FALLBACK_CHARS),
            amount: None,
            transaction_type: TransactionType::Expense,
            category: DEFAULT_CATEGORY.to_string(),
            payment_method: None,
            account: None,
            installments_total: None,
            date: today,
            needs_review: true,
        }
    }
}

fn has_income_cue(description: &str) -> bool {
    let folded = fold_accents(&description.to_lowercase());
    INCOME_CUES.iter().any(|cue| folded.contains(cue))
}

//
// ================= Memory =================
//

#[derive(Debug, Clone, Copy)]
pub struct MemoryNormalizer {
    offset: FixedOffset,
}

impl MemoryNormalizer {
    /// `offset` is the user's local offset, used for naive dates and times.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn normalize(&self, raw: &Value, source: &str) -> Result<MemoryRecord> {
        let data = raw.as_object().ok_or_else(|| {
            AssistantError::ValidationFailure("memory payload is not a JSON object".to_string())
        })?;

        let memory_type = data
            .get("memory_type")
            .and_then(Value::as_str)
            .and_then(|t| MemoryType::parse(t.trim()))
            .ok_or_else(|| AssistantError::ValidationFailure("invalid memory_type".to_string()))?;

        let content = non_empty_str(data, "content")
            .ok_or_else(|| AssistantError::ValidationFailure("missing content".to_string()))?
            .to_string();

        let tags = match data.get("tags") {
            Some(Value::Array(items)) => {
                let mut tags: Vec<String> = Vec::with_capacity(items.len());
                for item in items {
                    let tag = item.as_str().ok_or_else(|| {
                        AssistantError::ValidationFailure("tags must be strings".to_string())
                    })?;
                    let tag = tag.trim();
                    if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                        tags.push(tag.to_string());
                    }
                }
                tags
            }
            _ => {
                return Err(AssistantError::ValidationFailure(
                    "tags must be a list".to_string(),
                ))
            }
        };

        let datetime = data
            .get("datetime")
            .and_then(Value::as_str)
            .and_then(|raw| self.parse_datetime(raw));

        Ok(MemoryRecord {
            content,
            memory_type,
            tags,
            datetime,
            source: source.to_string(),
        })
    }

    pub fn fallback(&self, source_text: &str, source: &str) -> MemoryRecord {
        MemoryRecord {
            content: source_text.trim().to_string(),
            memory_type: MemoryType::Note,
            tags: Vec::new(),
            datetime: None,
            source: source.to_string(),
        }
    }

    /// Full instants are kept; naive values are local; a bare date means 09:00.
    pub fn parse_datetime(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant);
        }

        const NAIVE_FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(9, 0, 0))
            })?;

        self.offset.from_local_datetime(&naive).single()
    }
}
