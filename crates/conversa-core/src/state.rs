//! UI-agnostic conversation state types
//!
//! These are the values the history store owns and the provider clients
//! translate into their own wire formats. Nothing here depends on a
//! particular front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A typed fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    /// A `data:` URL or a remote URL.
    Image { url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::Image { url: url.into() }
    }
}

/// Message body: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Parts(parts) => parts.is_empty(),
        }
    }

    /// The first text fragment, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Parts(parts) => parts.iter().find_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            }),
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Content::Text(text) => Some(text),
            Content::Parts(parts) => parts.iter_mut().find_map(|part| match part {
                ContentPart::Text { text } => Some(text),
                ContentPart::Image { .. } => None,
            }),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Where the message pipeline is in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    AwaitingResponse,
    Typing,
}

impl PipelineState {
    /// Only an idle pipeline takes a new send or a regenerate.
    pub fn accepts_input(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_serialize_with_kind_tag() {
        let msg = ChatMessage::user(Content::Parts(vec![
            ContentPart::text("oi"),
            ContentPart::image("data:image/png;base64,AAAA"),
        ]));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["kind"], "text");
        assert_eq!(json["content"][1]["url"], "data:image/png;base64,AAAA");
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_text_finds_first_text_part() {
        let content = Content::Parts(vec![
            ContentPart::image("https://example.com/a.png"),
            ContentPart::text("legenda"),
        ]);
        assert_eq!(content.text(), Some("legenda"));
        assert!(!content.is_empty());
        assert!(Content::Parts(Vec::new()).is_empty());
    }

    #[test]
    fn test_only_idle_accepts_input() {
        assert!(PipelineState::Idle.accepts_input());
        assert!(!PipelineState::AwaitingResponse.accepts_input());
        assert!(!PipelineState::Typing.accepts_input());
    }
}
