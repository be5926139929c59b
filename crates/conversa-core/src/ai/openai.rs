use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::{CompletionClient, CompletionRequest};
use crate::state::{ChatMessage, Content, ContentPart};

#[derive(Serialize, Debug, PartialEq)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIPart>),
}

#[derive(Serialize, Debug, PartialEq)]
struct OpenAIMessage {
    role: &'static str,
    content: OpenAIContent,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

fn to_wire(message: &ChatMessage) -> OpenAIMessage {
    let content = match &message.content {
        Content::Text(text) => OpenAIContent::Text(text.clone()),
        Content::Parts(parts) => OpenAIContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => OpenAIPart::Text { text: text.clone() },
                    ContentPart::Image { url } => OpenAIPart::ImageUrl {
                        image_url: OpenAIImageUrl { url: url.clone() },
                    },
                })
                .collect(),
        ),
    };
    OpenAIMessage {
        role: message.role.as_str(),
        content,
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com")
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let body = OpenAIRequest {
            model: &request.model,
            messages: request.messages.iter().map(to_wire).collect(),
        };

        let response = self.client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, text));
        }

        let openai_response: OpenAIResponse = response.json().await?;
        openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI returned no message content"))
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
        ]
    }
}

impl CompletionClient for OpenAIClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String>> {
        self.chat(request).boxed()
    }
}
