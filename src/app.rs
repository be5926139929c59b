use std::path::{Path, PathBuf};
use std::sync::Arc;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::{mpsc::UnboundedSender, watch, Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use conversa_core::ai::{build_client, ClientOptions, CompletionClient};
use conversa_core::config::{AiConfig, ResponseStyle};
use conversa_core::location::{self, LocationProvider};
use conversa_core::{
    ChatError, ClaudeClient, MessagePipeline, OllamaClient, OpenAIClient, PipelineState,
    Provider, Settings, StopHandle, TurnOutcome,
};

use crate::tui::{AppEvent, ViewUpdate};
use crate::view::ChannelView;

pub const INIT_APOLOGY: &str =
    "Desculpe, ocorreu um erro ao inicializar o aplicativo. Usando as configurações padrão.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    Notice,
}

/// One block of the visible transcript. Assistant bodies are markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub speaker: Speaker,
    pub body: String,
    pub timestamp: Option<String>,
    pub typing: bool,
}

impl Entry {
    pub fn user(text: &str) -> Self {
        Self {
            speaker: Speaker::User,
            body: text.to_string(),
            timestamp: None,
            typing: false,
        }
    }

    pub fn notice(text: &str) -> Self {
        Self {
            speaker: Speaker::Notice,
            body: text.to_string(),
            timestamp: None,
            typing: false,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,

    // Input line
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars
    pub input_enabled: bool,
    pub attachments: Vec<String>,

    // Transcript
    pub transcript: Vec<Entry>,
    pub scroll: u16,
    pub follow: bool,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Turn state
    pub pipeline: Arc<Mutex<MessagePipeline>>,
    pub stop: StopHandle,
    pub state: watch::Receiver<PipelineState>,
    pub turn_active: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Provider state
    pub current_provider: Provider,
    pub selected_model: String,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub api_key_target_provider: Option<Provider>,

    // Settings
    pub settings: Settings,
    pub settings_path: Option<PathBuf>,
    pub locator: Arc<dyn LocationProvider>,

    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        settings: Settings,
        settings_path: Option<PathBuf>,
        locator: Arc<dyn LocationProvider>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let mut notices = Vec::new();
        let mut current_provider = settings.provider;
        let client = match client_for(&settings, current_provider) {
            Ok(client) => client,
            Err(e) => {
                warn!("{}, falling back to Ollama", e);
                notices.push(Entry::notice(&format!(
                    "{}. Usando Ollama; escolha outro provedor com /provider.",
                    e
                )));
                current_provider = Provider::Ollama;
                Arc::new(OllamaClient::new(
                    settings.base_url.as_deref().unwrap_or(Provider::Ollama.default_base_url()),
                ))
            }
        };

        let selected_model = settings
            .default_model
            .clone()
            .filter(|_| current_provider == settings.provider)
            .unwrap_or_else(|| current_provider.default_model().to_string());

        let pipeline = MessagePipeline::new(
            client,
            Arc::clone(&locator),
            &selected_model,
            settings.ai.clone(),
            settings.chat.clone(),
        );
        let stop = pipeline.stop_handle();
        let state = pipeline.subscribe();

        Self {
            should_quit: false,

            input: String::new(),
            cursor: 0,
            input_enabled: true,
            attachments: Vec::new(),

            transcript: notices,
            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            pipeline: Arc::new(Mutex::new(pipeline)),
            stop,
            state,
            turn_active: false,
            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            current_provider,
            selected_model,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            api_key_target_provider: None,

            settings,
            settings_path,
            locator,

            events,
        }
    }

    pub fn pipeline_state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.turn_active || !self.pipeline_state().accepts_input()
    }

    pub fn notice(&mut self, text: &str) {
        self.transcript.push(Entry::notice(text));
        self.follow = true;
    }

    /// Look up the location in the background and greet once it is known.
    pub fn spawn_greeting(&self) {
        let locator = Arc::clone(&self.locator);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let greeting = location::greet(locator.as_ref()).await;
            let _ = tx.send(AppEvent::Greeting(greeting));
        });
    }

    pub fn send_message(&mut self, text: String) {
        if self.is_busy() {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        }
        self.turn_active = true;
        self.attachments.clear();
        self.follow = true;

        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let mut view = ChannelView::new(tx.clone());
            let outcome = pipeline.lock().await.send(&text, &mut view).await;
            let _ = tx.send(AppEvent::TurnFinished(outcome));
        });
    }

    pub fn regenerate(&mut self) {
        if self.is_busy() {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        }
        self.turn_active = true;
        self.follow = true;

        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let mut view = ChannelView::new(tx.clone());
            let outcome = pipeline.lock().await.regenerate(&mut view).await;
            let _ = tx.send(AppEvent::TurnFinished(outcome));
        });
    }

    /// Only meaningful while a reply is being typed.
    pub fn stop_typing(&mut self) -> bool {
        if self.pipeline_state() == PipelineState::Typing {
            self.stop.stop();
            true
        } else {
            false
        }
    }

    pub fn finish_turn(&mut self, outcome: TurnOutcome) {
        self.turn_active = false;
        self.input_enabled = true;
        match outcome {
            TurnOutcome::Empty => {}
            TurnOutcome::Rejected => self.notice("Aguarde a resposta atual terminar."),
            TurnOutcome::Completed { stopped } => {
                info!(stopped, "turn completed");
            }
            TurnOutcome::Failed => warn!("turn failed"),
        }
    }

    pub fn apply_view_update(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::UserMessage(text) => self.transcript.push(Entry::user(&text)),
            ViewUpdate::BeginAssistant { timestamp } => self.transcript.push(Entry {
                speaker: Speaker::Assistant,
                body: String::new(),
                timestamp: Some(timestamp),
                typing: true,
            }),
            ViewUpdate::Frame(markup) => {
                if let Some(entry) = self.typing_entry_mut() {
                    entry.body = markup;
                }
            }
            ViewUpdate::FinishAssistant => {
                if let Some(entry) = self.typing_entry_mut() {
                    entry.typing = false;
                }
            }
            ViewUpdate::RemoveLastAssistant => {
                if let Some(i) = self
                    .transcript
                    .iter()
                    .rposition(|e| e.speaker == Speaker::Assistant)
                {
                    self.transcript.remove(i);
                }
            }
            ViewUpdate::InputEnabled(enabled) => self.input_enabled = enabled,
        }
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    fn typing_entry_mut(&mut self) -> Option<&mut Entry> {
        self.transcript
            .iter_mut()
            .rev()
            .find(|e| e.speaker == Speaker::Assistant && e.typing)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.pipeline_state() == PipelineState::AwaitingResponse {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    /// Rendering clamps and pins the offset when following.
    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.scroll = u16::MAX;
    }

    // Attachments and session commands. These all need the pipeline, which a
    // running turn holds.

    fn idle_pipeline(&self) -> Option<OwnedMutexGuard<MessagePipeline>> {
        if self.turn_active {
            return None;
        }
        Arc::clone(&self.pipeline).try_lock_owned().ok()
    }

    pub fn attach_file(&mut self, path: &Path) {
        let Some(mut pipeline) = self.idle_pipeline() else {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        };
        let result = pipeline.attach_file(path).map(|file| file.name.clone());
        drop(pipeline);

        match result {
            Ok(name) => {
                self.attachments.retain(|a| !a.starts_with("arquivo:"));
                self.attachments.push(format!("arquivo: {}", name));
            }
            Err(e @ ChatError::FileTooLarge { .. }) => {
                warn!("attachment rejected: {}", e);
                self.notice(&e.to_string());
            }
            Err(e) => self.notice(&format!("Não foi possível anexar o arquivo: {}", e)),
        }
    }

    pub fn attach_image(&mut self, source: &str) {
        let Some(mut pipeline) = self.idle_pipeline() else {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        };
        let result = pipeline.attach_image(source).map(|_| ());
        drop(pipeline);

        match result {
            Ok(()) => {
                self.attachments.retain(|a| !a.starts_with("imagem"));
                self.attachments.push("imagem".to_string());
            }
            Err(e) => self.notice(&format!("Não foi possível anexar a imagem: {}", e)),
        }
    }

    pub fn clear_conversation(&mut self) {
        let Some(mut pipeline) = self.idle_pipeline() else {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        };
        pipeline.clear_history();
        pipeline.clear_attachments();
        drop(pipeline);

        self.transcript.clear();
        self.attachments.clear();
        self.scroll = 0;
        self.follow = true;
    }

    /// Change the assistant configuration for this session.
    pub fn update_ai_config(&mut self, update: impl FnOnce(&mut AiConfig)) {
        let Some(mut pipeline) = self.idle_pipeline() else {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        };
        let mut ai = pipeline.ai_config().clone();
        update(&mut ai);
        pipeline.set_ai_config(ai.clone());
        drop(pipeline);

        self.settings.ai = ai;
    }

    pub fn set_nickname(&mut self, nickname: &str) {
        let nickname = nickname.to_string();
        self.update_ai_config(|ai| ai.nickname = nickname);
    }

    pub fn set_style(&mut self, style: ResponseStyle) {
        self.update_ai_config(|ai| ai.response_style = style);
    }

    pub fn set_instructions(&mut self, instructions: &str) {
        let instructions = instructions.to_string();
        self.update_ai_config(|ai| ai.instructions = instructions);
    }

    pub fn set_typing_speed(&mut self, ms: u64) {
        self.update_ai_config(|ai| ai.typing_speed = ms.max(1));
    }

    pub fn settings_summary(&self) -> String {
        let ai = &self.settings.ai;
        format!(
            "Provedor: {} ({})\nApelido: {}\nEstilo: {}\nVelocidade: {} ms\nInstruções: {}",
            self.current_provider.display_name(),
            self.selected_model,
            if ai.nickname.is_empty() { "-" } else { &ai.nickname },
            ai.response_style.as_str(),
            ai.typing_speed,
            ai.instructions
        )
    }

    pub fn save_settings(&mut self) {
        self.settings.provider = self.current_provider;
        self.settings.default_model = Some(self.selected_model.clone());

        let result = match &self.settings_path {
            Some(path) => self.settings.save_to(path),
            None => Err(ChatError::NoConfigDir),
        };
        match result {
            Ok(()) => self.notice("Configurações salvas."),
            Err(e) => {
                warn!("failed to save settings: {}", e);
                self.notice(&format!("Não foi possível salvar as configurações: {}", e));
            }
        }
    }

    pub fn reset_settings(&mut self) {
        self.update_ai_config(|ai| *ai = AiConfig::default());

        let result = match &self.settings_path {
            Some(path) => self.settings.reset_to(path),
            None => Err(ChatError::NoConfigDir),
        };
        match result {
            Ok(()) => self.notice("Configurações restauradas para o padrão."),
            Err(e) => {
                warn!("failed to reset settings: {}", e);
                self.notice(&format!("Não foi possível salvar as configurações: {}", e));
            }
        }
    }

    // Model picker methods
    pub fn open_model_picker(&mut self) {
        match self.current_provider {
            Provider::Ollama => {
                let base_url = self
                    .settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| Provider::Ollama.default_base_url().to_string());
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let models = OllamaClient::new(&base_url)
                        .list_models()
                        .await
                        .map_err(|e| e.to_string());
                    let _ = tx.send(AppEvent::Models(models));
                });
            }
            Provider::Claude => self.show_models(ClaudeClient::list_models()),
            Provider::OpenAI => self.show_models(OpenAIClient::list_models()),
        }
    }

    pub fn show_models(&mut self, models: Vec<String>) {
        if models.is_empty() {
            self.notice("Nenhum modelo encontrado. Baixe um com: ollama pull llama3.2");
            return;
        }
        // Select current model if in list, otherwise first
        let current_idx = models
            .iter()
            .position(|m| m == &self.selected_model)
            .unwrap_or(0);
        self.available_models = models;
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        else {
            return;
        };
        let Some(mut pipeline) = self.idle_pipeline() else {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        };
        pipeline.set_model(&model);
        drop(pipeline);

        self.selected_model = model;
        self.show_model_picker = false;
    }

    // Provider picker methods
    pub fn open_provider_picker(&mut self) {
        let current_idx = Provider::all()
            .iter()
            .position(|p| *p == self.current_provider)
            .unwrap_or(0);
        self.provider_picker_state.select(Some(current_idx));
        self.show_provider_picker = true;
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn pick_provider(&mut self) {
        let Some(provider) = self
            .provider_picker_state
            .selected()
            .and_then(|i| Provider::all().get(i).copied())
        else {
            return;
        };
        self.show_provider_picker = false;

        if self.get_key_source(provider).is_none() {
            self.api_key_target_provider = Some(provider);
            self.show_api_key_input = true;
            self.api_key_input.clear();
            self.api_key_input_cursor = 0;
        } else {
            self.switch_provider(provider);
        }
    }

    pub fn switch_provider(&mut self, provider: Provider) {
        let client = match client_for(&self.settings, provider) {
            Ok(client) => client,
            Err(e) => {
                self.notice(&e.to_string());
                return;
            }
        };
        let model = provider.default_model().to_string();
        let Some(mut pipeline) = self.idle_pipeline() else {
            self.notice("Aguarde a resposta atual terminar.");
            return;
        };
        pipeline.set_client(client, &model);
        drop(pipeline);

        info!(provider = provider.as_str(), %model, "provider switched");
        self.current_provider = provider;
        self.selected_model = model;
    }

    pub fn submit_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if let (Some(provider), false) = (self.api_key_target_provider, key.is_empty()) {
            match provider {
                Provider::Claude => self.settings.claude_api_key = Some(key),
                Provider::OpenAI => self.settings.openai_api_key = Some(key),
                Provider::Ollama => {}
            }
            self.switch_provider(provider);
        }
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.api_key_target_provider = None;
    }

    /// Returns the source of the API key for a provider: "env", "config", "local" or None
    pub fn get_key_source(&self, provider: Provider) -> Option<&'static str> {
        let Some(var) = provider.api_key_env() else {
            return Some("local");
        };
        if std::env::var(var).is_ok() {
            return Some("env");
        }
        let configured = match provider {
            Provider::Claude => self.settings.claude_api_key.is_some(),
            Provider::OpenAI => self.settings.openai_api_key.is_some(),
            Provider::Ollama => true,
        };
        configured.then_some("config")
    }
}

/// Environment keys win over configured ones.
pub fn api_key(settings: &Settings, provider: Provider) -> Option<String> {
    let from_env = provider.api_key_env().and_then(|var| std::env::var(var).ok());
    from_env.or_else(|| match provider {
        Provider::Claude => settings.claude_api_key.clone(),
        Provider::OpenAI => settings.openai_api_key.clone(),
        Provider::Ollama => None,
    })
}

fn client_for(
    settings: &Settings,
    provider: Provider,
) -> Result<Arc<dyn CompletionClient>, ChatError> {
    // A configured base URL belongs to the configured provider.
    let base_url = settings
        .base_url
        .clone()
        .filter(|_| provider == settings.provider);
    let options = ClientOptions {
        base_url,
        api_key: api_key(settings, provider),
    };
    build_client(provider, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conversa_core::location::{Location, CITY_UNSUPPORTED};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use tokio::sync::mpsc;

    struct Nowhere;

    impl LocationProvider for Nowhere {
        fn locate(&self) -> BoxFuture<'_, Location> {
            async { Location::fallback(None, CITY_UNSUPPORTED) }.boxed()
        }
    }

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(Settings::default(), None, Arc::new(Nowhere), tx);
        (app, rx)
    }

    #[tokio::test]
    async fn test_frames_replace_typing_entry() {
        let (mut app, _rx) = app();
        app.apply_view_update(ViewUpdate::UserMessage("oi".to_string()));
        app.apply_view_update(ViewUpdate::BeginAssistant { timestamp: "09:15".to_string() });
        app.apply_view_update(ViewUpdate::Frame("O".to_string()));
        app.apply_view_update(ViewUpdate::Frame("Ol".to_string()));
        app.apply_view_update(ViewUpdate::FinishAssistant);

        assert_eq!(app.transcript.len(), 2);
        let reply = &app.transcript[1];
        assert_eq!(reply.body, "Ol");
        assert_eq!(reply.timestamp.as_deref(), Some("09:15"));
        assert!(!reply.typing);
    }

    #[tokio::test]
    async fn test_remove_last_assistant_entry() {
        let (mut app, _rx) = app();
        app.apply_view_update(ViewUpdate::UserMessage("oi".to_string()));
        app.apply_view_update(ViewUpdate::BeginAssistant { timestamp: "09:15".to_string() });
        app.apply_view_update(ViewUpdate::FinishAssistant);
        app.apply_view_update(ViewUpdate::RemoveLastAssistant);

        assert_eq!(app.transcript, vec![Entry::user("oi")]);
    }

    #[tokio::test]
    async fn test_stop_ignored_when_not_typing() {
        let (mut app, _rx) = app();
        assert!(!app.stop_typing());
        assert!(!app.stop.is_stopped());
    }

    #[tokio::test]
    async fn test_busy_app_rejects_second_send() {
        let (mut app, _rx) = app();
        app.turn_active = true;
        app.send_message("oi".to_string());
        assert_eq!(
            app.transcript.last().map(|e| e.body.as_str()),
            Some("Aguarde a resposta atual terminar.")
        );
    }

    #[tokio::test]
    async fn test_session_settings_apply_to_pipeline() {
        let (mut app, _rx) = app();
        app.set_nickname("Bia");
        app.set_style(ResponseStyle::Formal);

        let pipeline = app.pipeline.try_lock().unwrap();
        assert_eq!(pipeline.ai_config().nickname, "Bia");
        assert_eq!(pipeline.ai_config().response_style, ResponseStyle::Formal);
        drop(pipeline);
        assert_eq!(app.settings.ai.nickname, "Bia");
    }

    #[tokio::test]
    async fn test_save_and_reset_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (mut app, _rx) = app();
        app.settings_path = Some(path.clone());

        app.set_nickname("Rafa");
        app.save_settings();
        assert_eq!(Settings::load_from(&path).unwrap().ai.nickname, "Rafa");

        app.reset_settings();
        assert_eq!(Settings::load_from(&path).unwrap().ai, AiConfig::default());
        assert_eq!(app.settings.ai, AiConfig::default());
    }

    #[tokio::test]
    async fn test_oversized_file_shows_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grande.txt");
        std::fs::write(&path, vec![b'x'; 2048]).unwrap();
        let (mut app, _rx) = app();
        app.update_ai_config(|ai| ai.max_file_size = 1024);

        app.attach_file(&path);

        assert!(app.attachments.is_empty());
        assert_eq!(
            app.transcript.last().map(|e| e.body.as_str()),
            Some("Arquivo muito grande. Máximo permitido: 1 KB")
        );
    }
}
