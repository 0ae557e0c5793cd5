//! HTTP adapter for the chat transport
//!
//! Raw text messages, confirm/cancel actions and the bot commands, keyed by
//! a transport user id that is mapped onto a stable UUID.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::Assistant;
use crate::confirmation::{Action, CommittedRecords, ConfirmationOutcome, GENERIC_FAILURE_MESSAGE};
use crate::error::AssistantError;
use crate::models::PeriodSummary;

/// Notes shown by the `list-recent` command.
pub const RECENT_NOTES_LIMIT: usize = 5;

const START_MESSAGE: &str = "Hi! Send me what you spent or earned, or anything you want to remember. \
I will show you what I understood and ask you to confirm before saving.";

const HELP_MESSAGE: &str = "Examples:\n\
- Gastei 45,90 no almoço hoje\n\
- Comprei um notebook por 3000 em 6x\n\
- Lembrete pagar cartão amanhã às 10\n\
- Ideia criar um assistente pessoal com IA\n\n\
Commands: start, help, list-recent, resync";

const CONFIRM_PROMPT: &str = "Confirm to save or cancel to discard.";
const REVIEW_PROMPT: &str =
    "Some details could not be understood. Cancel and send the message again with more details.";

// ================= Request Models =================

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub user_id: Option<String>,
    pub chat_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub user_id: Option<String>,
    pub chat_id: Option<String>,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

// ================= Response Wrapper =================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, message: impl Into<String>) -> ApiResult {
    (status, Json(ApiResponse::error(message.into())))
}

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<Assistant>,
}

// ================= User identity =================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Version 4 and RFC 4122 variant bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Transport ids that are already UUIDs pass through; anything else is hashed.
pub fn resolve_user_id(user_id: Option<&str>, chat_id: Option<&str>) -> uuid::Uuid {
    let seed = user_id
        .filter(|v| !v.trim().is_empty())
        .or(chat_id.filter(|v| !v.trim().is_empty()));

    match seed {
        Some(v) => uuid::Uuid::parse_str(v.trim()).unwrap_or_else(|_| stable_uuid_from_string(v.trim())),
        None => stable_uuid_from_string("anonymous-user"),
    }
}

// ================= Handlers =================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn handle_message(
    State(state): State<ApiState>,
    Json(req): Json<MessageRequest>,
) -> ApiResult {
    let user_id = resolve_user_id(req.user_id.as_deref(), req.chat_id.as_deref());
    info!(user_id = %user_id, "Message received");

    let today = state.assistant.today();
    match state.assistant.intake.handle_message(user_id, &req.text, today).await {
        Ok(outcome) => {
            let prompt = if outcome.needs_review() {
                REVIEW_PROMPT
            } else {
                CONFIRM_PROMPT
            };
            ok(json!({
                "user_id": user_id.to_string(),
                "domain": outcome.classification.domain,
                "confidence": outcome.classification.confidence,
                "needs_review": outcome.needs_review(),
                "fallback": outcome.is_fallback(),
                "replaced_previous": outcome.replaced_previous,
                "pending": outcome.pending,
                "prompt": prompt,
            }))
        }
        Err(AssistantError::InvalidInput(message)) => fail(StatusCode::BAD_REQUEST, message),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Intake failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE)
        }
    }
}

async fn handle_action(
    State(state): State<ApiState>,
    Json(req): Json<ActionRequest>,
) -> ApiResult {
    let user_id = resolve_user_id(req.user_id.as_deref(), req.chat_id.as_deref());

    let action: Action = match req.action.parse() {
        Ok(action) => action,
        Err(e) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let today = state.assistant.today();
    let outcome = match state.assistant.confirmations.handle(user_id, action, today).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Action failed");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE);
        }
    };

    let status = outcome.status();
    let message = outcome.message();

    // The sync handle is dropped: mirroring finishes in the background.
    let records = match outcome {
        ConfirmationOutcome::Committed {
            records: CommittedRecords::Transactions(rows),
            ..
        } => json!({ "transactions": rows }),
        ConfirmationOutcome::Committed {
            records: CommittedRecords::Memory(note),
            ..
        } => json!({ "memory": note }),
        ConfirmationOutcome::Refused { reason, .. } => json!({ "reason": reason }),
        _ => serde_json::Value::Null,
    };

    ok(json!({
        "user_id": user_id.to_string(),
        "status": status,
        "message": message,
        "records": records,
    }))
}

async fn handle_command(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult {
    info!(command = %name, "Command received");

    match name.as_str() {
        "start" => ok(json!({ "message": START_MESSAGE })),
        "help" => ok(json!({ "message": HELP_MESSAGE })),
        "list-recent" => match state.assistant.repositories.memories.list_recent(RECENT_NOTES_LIMIT).await {
            Ok(notes) => ok(json!({ "notes": notes })),
            Err(e) => {
                error!(error = %e, "Listing recent notes failed");
                fail(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE)
            }
        },
        "resync" => match state.assistant.reconciler.resync_all().await {
            Ok(outcome) => ok(outcome),
            Err(e) => {
                error!(error = %e, "Resync failed");
                fail(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE)
            }
        },
        other => fail(StatusCode::NOT_FOUND, format!("Unknown command: {}", other)),
    }
}

async fn list_transactions(
    State(state): State<ApiState>,
    Query(period): Query<PeriodQuery>,
) -> ApiResult {
    if let (Some(start), Some(end)) = (period.start, period.end) {
        if start > end {
            return fail(StatusCode::BAD_REQUEST, "start must not be after end");
        }
    }

    match state
        .assistant
        .repositories
        .transactions
        .list_by_period(period.start, period.end)
        .await
    {
        Ok(rows) => {
            let summary = PeriodSummary::from_transactions(&rows);
            ok(json!({ "transactions": rows, "summary": summary }))
        }
        Err(e) => {
            error!(error = %e, "Listing transactions failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE)
        }
    }
}

// ================= Router =================

pub fn create_router(assistant: Arc<Assistant>) -> Router {
    let state = ApiState { assistant };

    Router::new()
        .route("/health", get(health))
        .route("/api/messages", post(handle_message))
        .route("/api/actions", post(handle_action))
        .route("/api/commands/:name", post(handle_command))
        .route("/api/transactions", get(list_transactions))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    assistant: Arc<Assistant>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(assistant);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Components;
    use crate::classifier::LexicalClassifier;
    use crate::repository::Repositories;
    use crate::session::InMemorySessionStore;
    use crate::sync::SyncService;
    use crate::test_support::{RecordingMirror, ScriptedCompletion};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::FixedOffset;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const NOTEBOOK_REPLY: &str = r#"{"description": "Notebook", "amount": 3000,
        "transaction_type": "expense", "category": "Eletrônicos", "payment_method": "credit",
        "account": null, "installments_total": 6, "transaction_date": "2025-12-20"}"#;

    fn router(replies: &[&str]) -> Router {
        let assistant = Assistant::new(Components {
            completion: Arc::new(ScriptedCompletion::replying(replies)),
            classifier: Box::new(LexicalClassifier),
            repositories: Repositories::in_memory(),
            sessions: Arc::new(InMemorySessionStore::new()),
            sync: SyncService::new(Arc::new(RecordingMirror::new()), Duration::from_secs(1)),
            income_forces_transfer: false,
            local_offset: FixedOffset::west_opt(3 * 3600).unwrap(),
            source: "api".to_string(),
        });
        create_router(Arc::new(assistant))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_user_ids_are_stable() {
        let a = resolve_user_id(Some("telegram:42"), None);
        assert_eq!(a, resolve_user_id(Some("telegram:42"), Some("other")));
        assert_eq!(a, resolve_user_id(None, Some("telegram:42")));
        assert_ne!(a, resolve_user_id(Some("telegram:43"), None));

        let raw = uuid::Uuid::new_v4();
        assert_eq!(resolve_user_id(Some(&raw.to_string()), None), raw);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&router(&[]), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_message_confirm_and_period_listing() {
        let app = router(&[NOTEBOOK_REPLY]);

        let (status, body) = call(
            &app,
            "POST",
            "/api/messages",
            Some(json!({ "user_id": "42", "text": "Comprei um notebook por 3000 em 6x" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["domain"], "finance");
        assert_eq!(body["data"]["needs_review"], false);
        assert_eq!(body["data"]["pending"]["record"]["installments_total"], 6);

        let (status, body) = call(
            &app,
            "POST",
            "/api/actions",
            Some(json!({ "user_id": "42", "action": "confirm" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "committed");
        assert_eq!(body["data"]["records"]["transactions"].as_array().unwrap().len(), 6);

        let (status, body) = call(&app, "GET", "/api/transactions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 6);
        assert_eq!(body["data"]["summary"]["expense"], 3000.0);
    }

    #[tokio::test]
    async fn test_confirm_with_nothing_pending() {
        let (status, body) = call(
            &router(&[]),
            "POST",
            "/api/actions",
            Some(json!({ "user_id": "7", "action": "confirm" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "nothing_pending");
        assert_eq!(body["data"]["message"], "Nothing to confirm.");
    }

    #[tokio::test]
    async fn test_fallback_then_confirm_is_refused() {
        let app = router(&[]);

        let (_, body) = call(
            &app,
            "POST",
            "/api/messages",
            Some(json!({ "chat_id": "99", "text": "Gastei 45,90 no almoço hoje" })),
        )
        .await;
        assert_eq!(body["data"]["fallback"], true);
        assert_eq!(body["data"]["needs_review"], true);

        let (_, body) = call(
            &app,
            "POST",
            "/api/actions",
            Some(json!({ "chat_id": "99", "action": "confirm" })),
        )
        .await;
        assert_eq!(body["data"]["status"], "refused");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let app = router(&[]);

        let (status, _) = call(
            &app,
            "POST",
            "/api/actions",
            Some(json!({ "user_id": "1", "action": "undo" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "GET",
            "/api/transactions?start=2025-02-01&end=2025-01-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", "/api/commands/dance", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_commands() {
        let app = router(&[]);

        let (_, body) = call(&app, "POST", "/api/commands/help", None).await;
        assert!(body["data"]["message"].as_str().unwrap().contains("list-recent"));

        let (_, body) = call(&app, "POST", "/api/commands/list-recent", None).await;
        assert!(body["data"]["notes"].as_array().unwrap().is_empty());

        let (_, body) = call(&app, "POST", "/api/commands/resync", None).await;
        assert_eq!(body["data"]["total"], 0);
    }
}
