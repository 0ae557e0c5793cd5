//! Gemini API client used as the completion service
//!
//! Every extraction and model-backed classification goes through
//! [`CompletionService`]. The Gemini implementation keeps a long-lived
//! reqwest::Client for connection pooling and a hard request timeout.

use crate::error::AssistantError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// One completion call: fixed instruction, user text, decoding temperature.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_instruction: &'a str,
    pub user_text: &'a str,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub finish_reason: Option<String>,
}

impl Completion {
    /// Confidence derived from how the generation finished.
    pub fn confidence(&self) -> f32 {
        match self.finish_reason.as_deref() {
            Some("STOP") => 0.95,
            Some("MAX_TOKENS") | Some("LENGTH") => 0.6,
            Some("SAFETY") => 0.4,
            _ => 0.7,
        }
    }
}

/// External text completion dependency
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> crate::Result<Completion>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> crate::Result<Self> {
        Self::with_base_url(api_key, model, timeout, DEFAULT_BASE_URL)
    }

    /// Point the client at another host (proxies, test servers).
    pub fn with_base_url(
        api_key: String,
        model: &str,
        timeout: Duration,
        base_url: &str,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
        })
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> crate::Result<Completion> {
        if self.api_key.is_empty() {
            return Err(AssistantError::Config(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.user_text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: 0.9,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: request.system_instruction.to_string(),
                }],
            },
        };

        debug!("Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::ExtractionFailure(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response ({}): {}", status, error_text);
            return Err(AssistantError::ExtractionFailure(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::LlmError("No candidates from Gemini".to_string()))?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .next()
            .map(|p| p.text)
            .ok_or_else(|| AssistantError::LlmError("Empty response from Gemini".to_string()))?;

        Ok(Completion {
            text,
            finish_reason: candidate.finish_reason,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

/// Strip a markdown code fence the model sometimes wraps JSON in.
pub fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
