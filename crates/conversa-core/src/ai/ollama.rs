use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::warn;

use super::{CompletionClient, CompletionRequest};
use crate::attachment::split_data_url;
use crate::state::{ChatMessage, Content, ContentPart};

#[derive(Serialize, Debug, PartialEq)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[allow(dead_code)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// Ollama takes one text body plus raw base64 images per message.
fn to_wire(message: &ChatMessage) -> OllamaMessage {
    let mut texts = Vec::new();
    let mut images = Vec::new();

    match &message.content {
        Content::Text(text) => texts.push(text.as_str()),
        Content::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => texts.push(text.as_str()),
                    ContentPart::Image { url } => match split_data_url(url) {
                        Some((_, data)) => images.push(data.to_string()),
                        None => warn!(%url, "ollama only accepts inline images, skipping"),
                    },
                }
            }
        }
    }

    OllamaMessage {
        role: message.role.as_str(),
        content: texts.join("\n\n"),
        images,
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(to_wire).collect(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        let ollama_response: OllamaChatResponse = response.json().await?;
        Ok(ollama_response.message.content)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        Ok(models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect())
    }
}

impl CompletionClient for OllamaClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String>> {
        self.chat(request).boxed()
    }
}
