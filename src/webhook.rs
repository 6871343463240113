use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_macros::debug_handler;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bot::ChatBot;
use crate::line::ReplySink;
use crate::models::WebhookBody;
use crate::security::{verify_signature, SIGNATURE_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<ChatBot>,
    pub line: Arc<dyn ReplySink>,
    pub channel_secret: Arc<str>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/callback", post(callback))
        .with_state(state)
}

async fn home() -> &'static str {
    "OK"
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[debug_handler]
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if verify_signature(&state.channel_secret, &body, signature).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let payload: WebhookBody = serde_json::from_slice(&body).map_err(|e| {
        warn!("Unparseable webhook body: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    debug!("Webhook delivered {} events", payload.events.len());

    // Replies go out on their own tasks; LINE only needs the acknowledgement.
    for event in payload.events {
        if event.as_text().is_none() {
            continue;
        }
        let bot = Arc::clone(&state.bot);
        let line = Arc::clone(&state.line);
        tokio::spawn(async move {
            if let Some(text) = event.as_text() {
                bot.handle_event(text, line.as_ref()).await;
            }
        });
    }

    Ok("OK")
}
