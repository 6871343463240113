use serde::{Deserialize, Serialize};

// Webhook models
#[derive(Deserialize, Debug, Default)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// A text message event reduced to what the bot needs.
#[derive(Debug, PartialEq, Eq)]
pub struct InboundText<'a> {
    pub user_id: &'a str,
    pub text: &'a str,
    pub reply_token: &'a str,
}

impl WebhookEvent {
    pub fn as_text(&self) -> Option<InboundText<'_>> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref().filter(|m| m.kind == "text")?;
        Some(InboundText {
            user_id: self.source.as_ref()?.user_id.as_deref()?,
            text: message.text.as_deref()?.trim(),
            reply_token: self.reply_token.as_deref()?,
        })
    }
}

// Outbound models
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
        #[serde(rename = "quickReply", skip_serializing_if = "Option::is_none")]
        quick_reply: Option<QuickReply>,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: serde_json::Value,
    },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text {
            text: text.into(),
            quick_reply: None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuickReply {
    pub items: Vec<QuickReplyItem>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuickReplyItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: MessageAction,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MessageAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub label: String,
    pub text: String,
}

impl MessageAction {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: "message",
            label: label.into(),
            text: text.into(),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest<'a> {
    pub reply_token: &'a str,
    pub messages: &'a [Message],
}
