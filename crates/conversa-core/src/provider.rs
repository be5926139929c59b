use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Claude,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Ollama, Provider::Claude, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama (Local)",
            Provider::Claude => "Claude (Anthropic)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Ollama => "llama3.2:latest",
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434",
            Provider::Claude => "https://api.anthropic.com",
            Provider::OpenAI => "https://api.openai.com",
        }
    }

    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Ollama => None,
            Provider::Claude => Some("ANTHROPIC_API_KEY"),
            Provider::OpenAI => Some("OPENAI_API_KEY"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" | "chatgpt" => Ok(Provider::OpenAI),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for provider in Provider::all() {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert_eq!("Anthropic".parse::<Provider>(), Ok(Provider::Claude));
        assert!("bard".parse::<Provider>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Provider::OpenAI).unwrap();
        assert_eq!(json, "\"openai\"");
    }
}
