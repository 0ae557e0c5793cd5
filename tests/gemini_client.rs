use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ledger_intake::extraction::FinanceExtractor;
use ledger_intake::gemini::{CompletionRequest, CompletionService, GeminiClient};
use ledger_intake::normalize::FinanceNormalizer;
use ledger_intake::AssistantError;

const MODEL: &str = "gemini-2.0-flash";
const ENDPOINT: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn client(server: &MockServer, key: &str) -> GeminiClient {
    GeminiClient::with_base_url(key.to_string(), MODEL, Duration::from_secs(5), &server.base_url())
        .unwrap()
}

fn request<'a>(text: &'a str) -> CompletionRequest<'a> {
    CompletionRequest {
        system_instruction: "Reply with JSON only",
        user_text: text,
        temperature: 0.1,
    }
}

fn reply(text: &str, finish_reason: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] },
            "finishReason": finish_reason
        }]
    })
}

#[tokio::test]
async fn completion_returns_text_and_finish_reason() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(ENDPOINT)
                .query_param("key", "test-key")
                .header("content-type", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(reply("finance", "STOP"));
        })
        .await;

    let completion = client(&server, "test-key")
        .complete(request("Gastei 45,90 no almoço hoje"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(completion.text, "finance");
    assert_eq!(completion.finish_reason.as_deref(), Some("STOP"));
    assert!(completion.confidence() > 0.9);
}

#[tokio::test]
async fn error_status_is_an_extraction_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(503).body("overloaded");
        })
        .await;

    let err = client(&server, "test-key")
        .complete(request("x"))
        .await
        .unwrap_err();

    assert!(matches!(err, AssistantError::ExtractionFailure(_)));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn empty_candidates_are_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "candidates": [] }));
        })
        .await;

    assert!(client(&server, "test-key").complete(request("x")).await.is_err());
}

#[tokio::test]
async fn missing_key_never_calls_the_service() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(200).json_body(reply("memory", "STOP"));
        })
        .await;

    let err = client(&server, "").complete(request("x")).await.unwrap_err();

    assert!(matches!(err, AssistantError::Config(_)));
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn fenced_reply_flows_through_finance_extraction() {
    let server = MockServer::start_async().await;
    let payload = "```json\n{\"description\": \"Almoço\", \"amount\": \"R$ 45,90\", \"transaction_type\": \"expense\", \"category\": \"Alimentação\", \"payment_method\": \"cartão de débito\", \"account\": null, \"installments_total\": null, \"transaction_date\": \"2025-12-20\"}\n```";
    server
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(reply(payload, "STOP"));
        })
        .await;

    let extractor = FinanceExtractor::new(
        Arc::new(client(&server, "test-key")),
        FinanceNormalizer::default(),
    );
    let today = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();

    let result = extractor.extract("Gastei 45,90 no almoço hoje", today).await;

    assert!(!result.is_fallback());
    let intent = result.into_record();
    assert_eq!(intent.amount, Some(45.9));
    assert_eq!(intent.payment_method.map(|m| m.as_str()), Some("debit"));
    assert!(!intent.needs_review);
}

#[tokio::test]
async fn slow_service_hits_the_request_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(reply("finance", "STOP"))
                .delay(Duration::from_millis(1500));
        })
        .await;

    let slow_client = || {
        GeminiClient::with_base_url(
            "test-key".to_string(),
            MODEL,
            Duration::from_millis(200),
            &server.base_url(),
        )
        .unwrap()
    };

    let err = slow_client().complete(request("x")).await.unwrap_err();
    assert!(matches!(err, AssistantError::ExtractionFailure(_)));

    let extractor = FinanceExtractor::new(Arc::new(slow_client()), FinanceNormalizer::default());
    let today = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();

    let result = extractor.extract("Gastei 45,90 no almoço hoje", today).await;

    assert!(result.is_fallback());
    let intent = result.into_record();
    assert!(intent.needs_review);
    assert_eq!(intent.amount, None);
}
