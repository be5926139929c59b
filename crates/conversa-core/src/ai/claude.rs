use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::{CompletionClient, CompletionRequest};
use crate::attachment::split_data_url;
use crate::state::{ChatMessage, Content, ContentPart};

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClaudeBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeBlock>),
}

#[derive(Serialize, Debug, PartialEq)]
struct ClaudeMessage {
    role: &'static str,
    content: ClaudeContent,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeResponseContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeResponseContent>,
}

fn to_block(part: &ContentPart) -> ClaudeBlock {
    match part {
        ContentPart::Text { text } => ClaudeBlock::Text { text: text.clone() },
        ContentPart::Image { url } => {
            let source = match split_data_url(url) {
                Some((media_type, data)) => ImageSource::Base64 {
                    media_type: media_type.to_string(),
                    data: data.to_string(),
                },
                None => ImageSource::Url { url: url.clone() },
            };
            ClaudeBlock::Image { source }
        }
    }
}

fn to_wire(message: &ChatMessage) -> ClaudeMessage {
    let content = match &message.content {
        Content::Text(text) => ClaudeContent::Text(text.clone()),
        Content::Parts(parts) => ClaudeContent::Blocks(parts.iter().map(to_block).collect()),
    };
    ClaudeMessage {
        role: message.role.as_str(),
        content,
    }
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com")
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The system prompt travels in its own field, not as a message.
    pub async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let body = ClaudeRequest {
            model: &request.model,
            max_tokens: 4096,
            system: request.system_prompt(),
            messages: request.conversation().map(to_wire).collect(),
        };

        let response = self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Claude API error {}: {}", status, text));
        }

        let claude_response: ClaudeResponse = response.json().await?;
        Ok(claude_response.content.first()
            .map(|c| c.text.clone())
            .unwrap_or_default())
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
            "claude-3-opus-20240229".to_string(),
        ]
    }
}

impl CompletionClient for ClaudeClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String>> {
        self.chat(request).boxed()
    }
}
