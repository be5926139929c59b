use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ChatError, Result};
use crate::history::PrunePolicy;
use crate::markdown::RenderOptions;
use crate::provider::Provider;
use crate::typewriter::AnimationOptions;

pub const DEFAULT_INSTRUCTIONS: &str = "Você é um assistente de IA projetado para ser útil, \
inofensivo e honesto. Quando um arquivo for anexado, analise-o cuidadosamente e incorpore suas \
informações na resposta. Responda sempre em português brasileiro. Use o contexto de data e hora \
atual quando solicitado. Não use emojis em suas respostas em hipótese alguma.";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Default,
    Concise,
    Detailed,
    Friendly,
    Formal,
}

impl ResponseStyle {
    pub fn all() -> Vec<ResponseStyle> {
        vec![
            ResponseStyle::Default,
            ResponseStyle::Concise,
            ResponseStyle::Detailed,
            ResponseStyle::Friendly,
            ResponseStyle::Formal,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStyle::Default => "default",
            ResponseStyle::Concise => "concise",
            ResponseStyle::Detailed => "detailed",
            ResponseStyle::Friendly => "friendly",
            ResponseStyle::Formal => "formal",
        }
    }

    /// Sentence appended to the system prompt; none for the default style.
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            ResponseStyle::Default => None,
            ResponseStyle::Concise => Some(
                "Procure ser direto e conciso em suas respostas, evitando explicações desnecessárias.",
            ),
            ResponseStyle::Detailed => Some(
                "Forneça respostas detalhadas e abrangentes, explorando todos os aspectos relevantes.",
            ),
            ResponseStyle::Friendly => Some(
                "Adote um tom amigável e conversacional, como se estivesse conversando com um amigo.",
            ),
            ResponseStyle::Formal => {
                Some("Mantenha um tom formal e profissional em todas as suas respostas.")
            }
        }
    }
}

impl FromStr for ResponseStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ResponseStyle::all()
            .into_iter()
            .find(|style| style.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown response style: {}", s))
    }
}

/// Assistant persona and limits, persisted key by key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AiConfig {
    pub instructions: String,
    pub nickname: String,
    pub response_style: ResponseStyle,
    /// Milliseconds per typewriter step.
    pub typing_speed: u64,
    /// Bytes.
    pub max_file_size: u64,
    /// Characters.
    pub max_file_content_length: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            nickname: String::new(),
            response_style: ResponseStyle::Default,
            typing_speed: 10,
            max_file_size: 1024 * 1024,
            max_file_content_length: 1_000_000,
        }
    }
}

impl AiConfig {
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.instructions.clone();

        if !self.nickname.is_empty() {
            prompt.push_str(&format!(
                " Sempre se refira ao usuário como \"{}\".",
                self.nickname
            ));
        }

        if let Some(directive) = self.response_style.directive() {
            prompt.push(' ');
            prompt.push_str(directive);
        }

        prompt
    }
}

/// Conversation and rendering tunables.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    pub max_history: usize,
    pub min_history_to_keep: usize,
    pub preserve_initial_context: bool,
    pub syntax_highlighting: bool,
    pub chars_per_step: usize,
    pub location_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            min_history_to_keep: 10,
            preserve_initial_context: true,
            syntax_highlighting: true,
            chars_per_step: 1,
            location_timeout_secs: 5,
        }
    }
}

impl ChatConfig {
    pub fn prune_policy(&self) -> PrunePolicy {
        PrunePolicy {
            max_history: self.max_history,
            min_to_keep: self.min_history_to_keep,
            preserve_initial_context: self.preserve_initial_context,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            syntax_highlighting: self.syntax_highlighting,
        }
    }

    pub fn animation_options(&self, ai: &AiConfig) -> AnimationOptions {
        AnimationOptions {
            chars_per_step: self.chars_per_step.max(1),
            speed: Duration::from_millis(ai.typing_speed.max(1)),
        }
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub provider: Provider,
    pub default_model: Option<String>,
    pub base_url: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ai: AiConfig,
    pub chat: ChatConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Missing file means defaults; missing keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "no settings file, using defaults");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|source| ChatError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ChatError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let io_err = |source| ChatError::SettingsIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| {
            ChatError::SettingsParse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, content).map_err(io_err)?;
        info!(?path, "settings saved");
        Ok(())
    }

    /// Restore the assistant configuration to its defaults and persist it.
    /// Provider, keys and location are left alone.
    pub fn reset_to(&mut self, path: &Path) -> Result<()> {
        self.ai = AiConfig::default();
        self.save_to(path)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.reset_to(&Self::get_config_path()?)
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ChatError::NoConfigDir)?;
        Ok(config_dir.join("conversa").join("config.json"))
    }
}
