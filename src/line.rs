use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client};
use tracing::warn;

use crate::error::BotError;
use crate::models::{Message, ReplyRequest};

/// LINE accepts at most five messages per reply token.
pub const MAX_REPLY_MESSAGES: usize = 5;

/// Sends the one reply an inbound event is allowed.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, reply_token: &str, messages: Vec<Message>) -> Result<(), BotError>;
}

pub struct LineClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl LineClient {
    pub fn new(access_token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReplySink for LineClient {
    async fn reply(&self, reply_token: &str, mut messages: Vec<Message>) -> Result<(), BotError> {
        if messages.len() > MAX_REPLY_MESSAGES {
            warn!(
                "Dropping {} messages over the reply limit",
                messages.len() - MAX_REPLY_MESSAGES
            );
            messages.truncate(MAX_REPLY_MESSAGES);
        }

        let url = format!("{}/v2/bot/message/reply", self.base_url);
        let request = ReplyRequest {
            reply_token,
            messages: &messages,
        };

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!("Reply delivered for token {}", reply_token);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BotError::LineApi { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn spawn_line_api(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/v2/bot/message/reply",
                post(
                    move |State(seen): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push((auth, body));
                        (status, "{\"message\":\"done\"}")
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), captured)
    }

    #[tokio::test]
    async fn test_reply_posts_token_and_capped_messages() {
        let (base, captured) = spawn_line_api(StatusCode::OK).await;
        let client = LineClient::new("access", &base);
        let messages = (0..7).map(|i| Message::text(i.to_string())).collect();

        client.reply("reply-token", messages).await.unwrap();

        let seen = captured.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer access"));
        assert_eq!(seen[0].1["replyToken"], "reply-token");
        assert_eq!(
            seen[0].1["messages"].as_array().unwrap().len(),
            MAX_REPLY_MESSAGES
        );
    }

    #[tokio::test]
    async fn test_reply_surfaces_api_errors() {
        let (base, _) = spawn_line_api(StatusCode::BAD_REQUEST).await;
        let client = LineClient::new("access", &base);

        let err = client
            .reply("expired", vec![Message::text("hi")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BotError::LineApi { status, .. } if status == reqwest::StatusCode::BAD_REQUEST
        ));
    }
}
