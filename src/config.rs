//! Runtime configuration read from the environment (and `.env`)

use crate::classifier::ClassifierPolicy;
use crate::error::AssistantError;
use crate::Result;
use chrono::FixedOffset;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 10;
/// America/Sao_Paulo without daylight saving.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub finance_db_id: Option<String>,
    pub reminders_db_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub database_url: Option<String>,
    pub notion: Option<NotionConfig>,
    pub port: u16,
    pub classifier_policy: ClassifierPolicy,
    pub income_forces_transfer: bool,
    pub completion_timeout: Duration,
    pub sync_timeout: Duration,
    pub local_offset: FixedOffset,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini_api_key = get("GEMINI_API_KEY");

        // Without a key the model policy cannot work, so lexical is the default.
        let classifier_policy = match get("CLASSIFIER_POLICY") {
            Some(raw) => ClassifierPolicy::from_str(&raw).map_err(AssistantError::Config)?,
            None if gemini_api_key.is_some() => ClassifierPolicy::Model,
            None => ClassifierPolicy::Lexical,
        };

        let notion = get("NOTION_API_TOKEN").map(|token| NotionConfig {
            token,
            finance_db_id: get("NOTION_FINANCE_DB_ID"),
            reminders_db_id: get("NOTION_REMINDERS_DB_ID"),
        });

        let offset_minutes: i32 = parse_or(
            "LOCAL_UTC_OFFSET_MINUTES",
            get("LOCAL_UTC_OFFSET_MINUTES"),
            DEFAULT_UTC_OFFSET_MINUTES,
        )?;
        let local_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AssistantError::Config(format!(
                    "LOCAL_UTC_OFFSET_MINUTES out of range: {}",
                    offset_minutes
                ))
            })?;

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            notion,
            port: parse_or("PORT", get("PORT").or_else(|| get("API_PORT")), DEFAULT_PORT)?,
            classifier_policy,
            income_forces_transfer: parse_bool(
                "INCOME_FORCES_TRANSFER",
                get("INCOME_FORCES_TRANSFER"),
            )?,
            completion_timeout: Duration::from_secs(parse_or(
                "COMPLETION_TIMEOUT_SECS",
                get("COMPLETION_TIMEOUT_SECS"),
                DEFAULT_COMPLETION_TIMEOUT_SECS,
            )?),
            sync_timeout: Duration::from_secs(parse_or(
                "SYNC_TIMEOUT_SECS",
                get("SYNC_TIMEOUT_SECS"),
                DEFAULT_SYNC_TIMEOUT_SECS,
            )?),
            local_offset,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| AssistantError::Config(format!("{} has an invalid value: {}", key, value))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<bool> {
    match raw.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => Err(AssistantError::Config(format!(
            "{} has an invalid value: {}",
            key, other
        ))),
    }
}
