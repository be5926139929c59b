pub mod claude;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use std::sync::Arc;

use anyhow::Result;
use futures_util::future::BoxFuture;

use crate::error::ChatError;
use crate::provider::Provider;
use crate::state::{ChatMessage, ChatRole};

/// One completion call: the system prompt followed by the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(model: &str, system_prompt: &str, history: &[ChatMessage]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend_from_slice(history);
        Self {
            model: model.to_string(),
            messages,
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|msg| msg.role == ChatRole::System)
            .and_then(|msg| msg.content.text())
    }

    /// Everything except system messages, in order.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|msg| msg.role != ChatRole::System)
    }
}

/// The hosted completion service. Any error is surfaced to the user as a
/// generic apology; nothing is retried.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String>>;
}

/// Connection details for [`build_client`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

pub fn build_client(
    provider: Provider,
    options: &ClientOptions,
) -> std::result::Result<Arc<dyn CompletionClient>, ChatError> {
    let base_url = options
        .base_url
        .clone()
        .unwrap_or_else(|| provider.default_base_url().to_string());

    let client: Arc<dyn CompletionClient> = match provider {
        Provider::Ollama => Arc::new(OllamaClient::new(&base_url)),
        Provider::Claude => {
            let key = options
                .api_key
                .as_deref()
                .ok_or(ChatError::MissingApiKey("Claude"))?;
            Arc::new(ClaudeClient::with_base_url(key, &base_url))
        }
        Provider::OpenAI => {
            let key = options
                .api_key
                .as_deref()
                .ok_or(ChatError::MissingApiKey("OpenAI"))?;
            Arc::new(OpenAIClient::with_base_url(key, &base_url))
        }
    };
    Ok(client)
}
