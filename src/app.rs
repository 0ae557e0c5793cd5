//! Service wiring
//!
//! Every client (completion, primary store, mirror) is constructed here once
//! and injected into the components that use it.

use crate::classifier::{build_classifier, IntentClassifier};
use crate::config::AppConfig;
use crate::confirmation::ConfirmationMachine;
use crate::extraction::{FinanceExtractor, MemoryExtractor};
use crate::gemini::{CompletionService, GeminiClient};
use crate::normalize::{FinanceNormalizer, MemoryNormalizer};
use crate::pipeline::IntakePipeline;
use crate::reconciler::Reconciler;
use crate::repository::Repositories;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::sync::{NotionClient, SyncService};
use crate::Result;
use chrono::{FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Source label stamped on memory notes received through the HTTP adapter.
pub const DEFAULT_SOURCE: &str = "api";

pub struct Components {
    pub completion: Arc<dyn CompletionService>,
    pub classifier: Box<dyn IntentClassifier>,
    pub repositories: Repositories,
    pub sessions: Arc<dyn SessionStore>,
    pub sync: SyncService,
    pub income_forces_transfer: bool,
    pub local_offset: FixedOffset,
    pub source: String,
}

pub struct Assistant {
    pub intake: IntakePipeline,
    pub confirmations: ConfirmationMachine,
    pub reconciler: Reconciler,
    pub repositories: Repositories,
    local_offset: FixedOffset,
}

impl Assistant {
    pub fn new(components: Components) -> Self {
        let Components {
            completion,
            classifier,
            repositories,
            sessions,
            sync,
            income_forces_transfer,
            local_offset,
            source,
        } = components;

        let intake = IntakePipeline::new(
            classifier,
            FinanceExtractor::new(
                completion.clone(),
                FinanceNormalizer::new(income_forces_transfer),
            ),
            MemoryExtractor::new(completion, MemoryNormalizer::new(local_offset), source),
            sessions.clone(),
        );

        let confirmations = ConfirmationMachine::new(
            sessions,
            repositories.transactions.clone(),
            repositories.memories.clone(),
            sync.clone(),
        );

        let reconciler = Reconciler::new(
            repositories.transactions.clone(),
            repositories.memories.clone(),
            sync,
        );

        Self {
            intake,
            confirmations,
            reconciler,
            repositories,
            local_offset,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.gemini_api_key.clone().unwrap_or_else(|| {
            warn!("GEMINI_API_KEY not set; every extraction will fall back to review");
            String::new()
        });
        let gemini: Arc<dyn CompletionService> = Arc::new(GeminiClient::new(
            api_key,
            &config.gemini_model,
            config.completion_timeout,
        )?);

        let classifier_client = config.gemini_api_key.as_ref().map(|_| gemini.clone());
        let classifier = build_classifier(config.classifier_policy, classifier_client);
        info!(policy = ?config.classifier_policy, "Intent classifier ready");

        let sync = match &config.notion {
            Some(notion) => {
                let client = NotionClient::new(
                    notion.token.clone(),
                    notion.finance_db_id.clone(),
                    notion.reminders_db_id.clone(),
                )?;
                info!("Mirror target: notion");
                SyncService::new(Arc::new(client), config.sync_timeout)
            }
            None => {
                warn!("NOTION_API_TOKEN not set; mirror sync disabled");
                SyncService::disabled()
            }
        };

        Ok(Self::new(Components {
            completion: gemini,
            classifier,
            repositories: Repositories::connect(config.database_url.as_deref())?,
            sessions: Arc::new(InMemorySessionStore::new()),
            sync,
            income_forces_transfer: config.income_forces_transfer,
            local_offset: config.local_offset,
            source: DEFAULT_SOURCE.to_string(),
        }))
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.local_offset).date_naive()
    }
}
