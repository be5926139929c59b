//! The message pipeline: one user turn from composition to the animated,
//! recorded reply.
//!
//! A turn moves `Idle -> AwaitingResponse -> Typing -> Idle`. Only an idle
//! pipeline accepts [`MessagePipeline::send`] or
//! [`MessagePipeline::regenerate`]; whatever happens inside a turn, it ends
//! back in `Idle` with input re-enabled.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ai::{CompletionClient, CompletionRequest};
use crate::attachment::{FileAttachment, ImageAttachment};
use crate::config::{AiConfig, ChatConfig};
use crate::error::Result;
use crate::history::ConversationHistory;
use crate::location::{self, LocationProvider};
use crate::markdown;
use crate::state::{ChatMessage, ChatRole, Content, ContentPart, PipelineState};
use crate::temporal::TemporalQuery;
use crate::typewriter::{self, AnimationOutcome, RenderTarget, StopHandle};

pub const ERROR_APOLOGY: &str =
    "Desculpe, ocorreu um erro ao processar sua mensagem. Por favor, tente novamente mais tarde.";
pub const IMAGE_PLACEHOLDER: &str = "Imagem enviada";

/// The transcript the pipeline drives. Assistant replies arrive through
/// [`RenderTarget::render`] between `begin_assistant_message` and
/// `finish_assistant_message`, one growing frame at a time.
pub trait ChatView: RenderTarget {
    fn show_user_message(&mut self, text: &str);
    fn begin_assistant_message(&mut self, timestamp_label: &str);
    fn finish_assistant_message(&mut self);
    fn remove_last_assistant_message(&mut self);
    fn set_input_enabled(&mut self, enabled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A turn was already in progress.
    Rejected,
    /// Nothing to send.
    Empty,
    Completed { stopped: bool },
    /// The apology was shown instead of a reply.
    Failed,
}

/// A composed user message and the lines the transcript shows for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    pub message: ChatMessage,
    pub transcript: Vec<String>,
}

/// Build the outgoing message from typed text and pending attachments.
///
/// There is exactly one text part, first, followed by the image if any. A
/// file folds its preamble and content into that text part.
pub fn compose(
    text: &str,
    image: Option<&ImageAttachment>,
    file: Option<&FileAttachment>,
) -> Option<Composed> {
    let text = text.trim();
    if text.is_empty() && image.is_none() && file.is_none() {
        return None;
    }

    let mut transcript = Vec::new();
    if image.is_some() {
        transcript.push(if text.is_empty() { IMAGE_PLACEHOLDER } else { text }.to_string());
    }

    let body = match file {
        Some(file) => {
            transcript.push(format!("Arquivo enviado: {}", file.name));
            if text.is_empty() {
                format!("{}\n\n{}", file.preamble(), file.content)
            } else {
                format!(
                    "{}\n\n{}\n\nConteúdo do arquivo:\n{}",
                    file.preamble(),
                    text,
                    file.content
                )
            }
        }
        None if text.is_empty() => IMAGE_PLACEHOLDER.to_string(),
        None => text.to_string(),
    };

    if image.is_none() && file.is_none() {
        transcript.push(text.to_string());
    }

    let mut parts = vec![ContentPart::text(body)];
    if let Some(image) = image {
        parts.push(ContentPart::image(image.url.clone()));
    }

    Some(Composed {
        message: ChatMessage::user(Content::Parts(parts)),
        transcript,
    })
}

/// Everything a session owns: the history and the pending attachments.
#[derive(Debug, Default)]
pub struct SessionState {
    pub history: ConversationHistory,
    pending_file: Option<FileAttachment>,
    pending_image: Option<ImageAttachment>,
}

struct IdleOnDrop(Arc<watch::Sender<PipelineState>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(PipelineState::Idle);
    }
}

pub struct MessagePipeline {
    client: Arc<dyn CompletionClient>,
    locator: Arc<dyn LocationProvider>,
    model: String,
    ai: AiConfig,
    chat: ChatConfig,
    session: SessionState,
    stop: StopHandle,
    state: Arc<watch::Sender<PipelineState>>,
}

impl MessagePipeline {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        locator: Arc<dyn LocationProvider>,
        model: &str,
        ai: AiConfig,
        chat: ChatConfig,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            client,
            locator,
            model: model.to_string(),
            ai,
            chat,
            session: SessionState::default(),
            stop: StopHandle::new(),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Follow state changes from outside a running turn.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Stops the reply currently being typed; no effect otherwise.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.session.history
    }

    pub fn clear_history(&mut self) {
        self.session.history.clear();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    /// Switch providers; the history carries over.
    pub fn set_client(&mut self, client: Arc<dyn CompletionClient>, model: &str) {
        self.client = client;
        self.set_model(model);
    }

    pub fn ai_config(&self) -> &AiConfig {
        &self.ai
    }

    pub fn set_ai_config(&mut self, ai: AiConfig) {
        self.ai = ai;
    }

    pub fn chat_config(&self) -> &ChatConfig {
        &self.chat
    }

    /// Replaces any pending file. On error nothing changes.
    pub fn attach_file(&mut self, path: &Path) -> Result<&FileAttachment> {
        let file = FileAttachment::load(
            path,
            self.ai.max_file_size,
            self.ai.max_file_content_length,
        )?;
        Ok(self.session.pending_file.insert(file))
    }

    /// Replaces any pending image. On error nothing changes.
    pub fn attach_image(&mut self, source: &str) -> Result<&ImageAttachment> {
        let image = ImageAttachment::load(source)?;
        Ok(self.session.pending_image.insert(image))
    }

    pub fn pending_file(&self) -> Option<&FileAttachment> {
        self.session.pending_file.as_ref()
    }

    pub fn pending_image(&self) -> Option<&ImageAttachment> {
        self.session.pending_image.as_ref()
    }

    pub fn clear_attachments(&mut self) {
        self.session.pending_file = None;
        self.session.pending_image = None;
    }

    pub async fn greeting(&self) -> String {
        location::greet(self.locator.as_ref()).await
    }

    pub async fn send<V>(&mut self, text: &str, view: &mut V) -> TurnOutcome
    where
        V: ChatView + ?Sized,
    {
        if !self.state().accepts_input() {
            debug!(state = ?self.state(), "send rejected, turn in progress");
            return TurnOutcome::Rejected;
        }

        let Some(composed) = compose(text, self.pending_image(), self.pending_file()) else {
            return TurnOutcome::Empty;
        };
        self.clear_attachments();

        if let Err(e) = self.session.history.append(composed.message) {
            warn!("user message not recorded: {}", e);
            return TurnOutcome::Empty;
        }
        for line in &composed.transcript {
            view.show_user_message(line);
        }
        info!(history = self.session.history.len(), "user turn recorded");

        self.respond(view).await
    }

    /// Drop the last reply and ask again for the same user turn.
    pub async fn regenerate<V>(&mut self, view: &mut V) -> TurnOutcome
    where
        V: ChatView + ?Sized,
    {
        if !self.state().accepts_input() {
            debug!(state = ?self.state(), "regenerate rejected, turn in progress");
            return TurnOutcome::Rejected;
        }

        let popped = self.session.history.last().map(|msg| msg.role) == Some(ChatRole::Assistant);
        if popped {
            self.session.history.pop_last();
        }

        match self.session.history.last() {
            Some(msg) if msg.role == ChatRole::User => {
                // After a failed turn the visible reply is the apology, which
                // is not in history but is replaced all the same.
                view.remove_last_assistant_message();
                info!(popped, "regenerating last reply");
                self.respond(view).await
            }
            _ => {
                if popped {
                    view.remove_last_assistant_message();
                }
                TurnOutcome::Empty
            }
        }
    }

    async fn respond<V>(&mut self, view: &mut V) -> TurnOutcome
    where
        V: ChatView + ?Sized,
    {
        self.state.send_replace(PipelineState::AwaitingResponse);
        let _idle = IdleOnDrop(Arc::clone(&self.state));
        view.set_input_enabled(false);

        self.answer_temporal_query().await;
        self.session.history.prune(&self.chat.prune_policy());

        let request = CompletionRequest::new(
            &self.model,
            &self.ai.system_prompt(),
            self.session.history.messages(),
        );
        debug!(model = %request.model, messages = request.messages.len(), "requesting completion");

        let outcome = match self.client.complete(&request).await {
            Ok(reply) if !reply.trim().is_empty() => {
                self.start_typing();
                let markup = markdown::render_with(&reply, &self.chat.render_options());
                let animation = self.reveal(view, &markup).await;

                let message = ChatMessage::assistant(reply).with_timestamp(Utc::now());
                if let Err(e) = self.session.history.append(message) {
                    warn!("assistant reply not recorded: {}", e);
                }
                info!(history = self.session.history.len(), ?animation, "assistant turn recorded");
                TurnOutcome::Completed {
                    stopped: animation == AnimationOutcome::Stopped,
                }
            }
            Ok(_) => {
                error!("completion returned an empty reply");
                self.apologize(view).await;
                TurnOutcome::Failed
            }
            Err(e) => {
                error!("completion failed: {:#}", e);
                self.apologize(view).await;
                TurnOutcome::Failed
            }
        };

        view.set_input_enabled(true);
        outcome
    }

    /// Replace the text of a date or year question with the answer.
    async fn answer_temporal_query(&mut self) {
        let Some(query) = self
            .session
            .history
            .last()
            .filter(|msg| msg.role == ChatRole::User)
            .and_then(|msg| msg.content.text())
            .and_then(TemporalQuery::detect)
        else {
            return;
        };

        let location = self.locator.locate().await;
        let answer = query.answer(&Local::now(), &location);
        debug!(?query, %answer, "temporal question rewritten");

        if let Some(text) = self
            .session
            .history
            .last_mut()
            .and_then(|msg| msg.content.text_mut())
        {
            *text = answer;
        }
    }

    async fn apologize<V>(&self, view: &mut V)
    where
        V: ChatView + ?Sized,
    {
        self.start_typing();
        let markup = markdown::render_with(ERROR_APOLOGY, &self.chat.render_options());
        self.reveal(view, &markup).await;
    }

    /// Stops are honored from the moment `Typing` is visible.
    fn start_typing(&self) {
        self.stop.reset();
        self.state.send_replace(PipelineState::Typing);
    }

    async fn reveal<V>(&self, view: &mut V, markup: &str) -> AnimationOutcome
    where
        V: ChatView + ?Sized,
    {
        view.begin_assistant_message(&Local::now().format("%H:%M").to_string());
        let outcome = typewriter::play(
            view,
            markup,
            self.chat.animation_options(&self.ai),
            &self.stop,
        )
        .await;
        view.finish_assistant_message();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn replying(replies: &[std::result::Result<&str, &str>]) -> Arc<Self> {
            let replies = replies
                .iter()
                .map(|r| r.map(|s| s.to_string()).map_err(|e| e.to_string()))
                .collect();
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl CompletionClient for ScriptedClient {
        fn complete<'a>(
            &'a self,
            request: &'a CompletionRequest,
        ) -> BoxFuture<'a, anyhow::Result<String>> {
            async move {
                self.requests.lock().unwrap().push(request.clone());
                match self.replies.lock().unwrap().pop_front() {
                    Some(Ok(reply)) => Ok(reply),
                    Some(Err(e)) => Err(anyhow::anyhow!(e)),
                    None => Err(anyhow::anyhow!("no scripted reply")),
                }
            }
            .boxed()
        }
    }

    struct FixedLocator(Location);

    impl LocationProvider for FixedLocator {
        fn locate(&self) -> BoxFuture<'_, Location> {
            let location = self.0.clone();
            async move { location }.boxed()
        }
    }

    fn recife() -> Arc<FixedLocator> {
        Arc::new(FixedLocator(Location {
            coordinates: Some((-8.05, -34.9)),
            city: "Recife".to_string(),
            country: "Brasil".to_string(),
            timezone: "-03:00".to_string(),
        }))
    }

    #[derive(Default)]
    struct RecordingView {
        events: Vec<String>,
        frames: Vec<String>,
        input_enabled: Vec<bool>,
        stop_after: Option<(usize, StopHandle)>,
        stop_on_begin: Option<StopHandle>,
    }

    impl RenderTarget for RecordingView {
        fn render(&mut self, markup: &str) {
            self.frames.push(markup.to_string());
            if let Some((n, handle)) = &self.stop_after {
                if self.frames.len() == *n {
                    handle.stop();
                }
            }
        }
    }

    impl ChatView for RecordingView {
        fn show_user_message(&mut self, text: &str) {
            self.events.push(format!("user:{}", text));
        }

        fn begin_assistant_message(&mut self, _timestamp_label: &str) {
            self.events.push("begin".to_string());
            if let Some(handle) = &self.stop_on_begin {
                handle.stop();
            }
        }

        fn finish_assistant_message(&mut self) {
            self.events.push("finish".to_string());
        }

        fn remove_last_assistant_message(&mut self) {
            self.events.push("remove".to_string());
        }

        fn set_input_enabled(&mut self, enabled: bool) {
            self.input_enabled.push(enabled);
        }
    }

    fn pipeline(client: Arc<ScriptedClient>) -> MessagePipeline {
        pipeline_with(client, ChatConfig::default())
    }

    fn pipeline_with(client: Arc<ScriptedClient>, chat: ChatConfig) -> MessagePipeline {
        let ai = AiConfig {
            instructions: "Base.".to_string(),
            ..AiConfig::default()
        };
        MessagePipeline::new(client, recife(), "modelo", ai, chat)
    }

    fn file(name: &str, content: &str) -> FileAttachment {
        FileAttachment {
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    fn image() -> ImageAttachment {
        ImageAttachment {
            url: "data:image/png;base64,AAAA".to_string(),
        }
    }

    fn text_of(message: &ChatMessage) -> &str {
        message.content.text().unwrap_or_default()
    }

    #[test]
    fn test_compose_plain_text() {
        let composed = compose("  oi  ", None, None).unwrap();
        assert_eq!(
            composed.message,
            ChatMessage::user(Content::Parts(vec![ContentPart::text("oi")]))
        );
        assert_eq!(composed.transcript, vec!["oi"]);
    }

    #[test]
    fn test_compose_nothing() {
        assert!(compose("   ", None, None).is_none());
    }

    #[test]
    fn test_compose_image_alone_gets_placeholder() {
        let composed = compose("", Some(&image()), None).unwrap();
        assert_eq!(
            composed.message.content,
            Content::Parts(vec![
                ContentPart::text(IMAGE_PLACEHOLDER),
                ContentPart::image("data:image/png;base64,AAAA"),
            ])
        );
        assert_eq!(composed.transcript, vec![IMAGE_PLACEHOLDER]);
    }

    #[test]
    fn test_compose_image_with_text() {
        let composed = compose("o que é?", Some(&image()), None).unwrap();
        assert_eq!(text_of(&composed.message), "o que é?");
        assert_eq!(composed.transcript, vec!["o que é?"]);
    }

    #[test]
    fn test_compose_file_folds_into_single_text_part() {
        let composed = compose("resuma", None, Some(&file("a.txt", "linha"))).unwrap();
        let Content::Parts(parts) = &composed.message.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 1);
        assert_eq!(
            text_of(&composed.message),
            "Instruções para análise do arquivo a.txt: Por favor, leia e interprete o conteúdo do arquivo anexado.\
             \n\nresuma\n\nConteúdo do arquivo:\nlinha"
        );
        assert_eq!(composed.transcript, vec!["Arquivo enviado: a.txt"]);
    }

    #[test]
    fn test_compose_file_without_text() {
        let composed = compose("", Some(&image()), Some(&file("a.txt", "linha"))).unwrap();
        assert!(text_of(&composed.message).ends_with("anexado.\n\nlinha"));
        assert_eq!(
            composed.transcript,
            vec![IMAGE_PLACEHOLDER.to_string(), "Arquivo enviado: a.txt".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_simple_turn() {
        let client = ScriptedClient::replying(&[Ok("Olá!")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();

        let outcome = pipeline.send("oi", &mut view).await;

        assert_eq!(outcome, TurnOutcome::Completed { stopped: false });
        let history = pipeline.history().messages();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history[0],
            ChatMessage::user(Content::Parts(vec![ContentPart::text("oi")]))
        );
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(history[1].content, Content::Text("Olá!".to_string()));
        assert!(history[1].timestamp.is_some());

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0], ChatMessage::system("Base."));
        assert_eq!(&requests[0].messages[1..], &history[..1]);

        assert_eq!(view.events, vec!["user:oi", "begin", "finish"]);
        assert_eq!(view.frames.last().map(String::as_str), Some("Olá!"));
        assert_eq!(view.input_enabled, vec![false, true]);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_replaces_last_reply() {
        let client = ScriptedClient::replying(&[Ok("primeira"), Ok("segunda")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();
        pipeline.send("oi", &mut view).await;
        let user_msg = pipeline.history().messages()[0].clone();

        let outcome = pipeline.regenerate(&mut view).await;

        assert_eq!(outcome, TurnOutcome::Completed { stopped: false });
        let requests = client.requests();
        assert_eq!(requests[1].messages.len(), 2);
        assert_eq!(requests[1].messages[1], user_msg);

        let history = pipeline.history().messages();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], user_msg);
        assert_eq!(text_of(&history[1]), "segunda");
        assert!(view.events.contains(&"remove".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_on_empty_history() {
        let client = ScriptedClient::replying(&[]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();

        assert_eq!(pipeline.regenerate(&mut view).await, TurnOutcome::Empty);
        assert!(client.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_after_failure_replaces_apology() {
        let client = ScriptedClient::replying(&[Err("503"), Ok("nova")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();

        assert_eq!(pipeline.send("oi", &mut view).await, TurnOutcome::Failed);
        let outcome = pipeline.regenerate(&mut view).await;

        assert_eq!(outcome, TurnOutcome::Completed { stopped: false });
        assert_eq!(
            view.events,
            vec!["user:oi", "begin", "finish", "remove", "begin", "finish"]
        );
        let history = pipeline.history().messages();
        assert_eq!(history.len(), 2);
        assert_eq!(text_of(&history[1]), "nova");
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_as_typing_begins_is_honored() {
        let client = ScriptedClient::replying(&[Ok("resposta")]);
        let mut pipeline = pipeline(client);
        let mut view = RecordingView {
            stop_on_begin: Some(pipeline.stop_handle()),
            ..RecordingView::default()
        };

        let outcome = pipeline.send("oi", &mut view).await;

        assert_eq!(outcome, TurnOutcome::Completed { stopped: true });
        assert!(view.frames.is_empty());
        assert_eq!(text_of(&pipeline.history().messages()[1]), "resposta");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_stop_cleared_before_typing() {
        let client = ScriptedClient::replying(&[Ok("ok")]);
        let mut pipeline = pipeline(client);
        let mut view = RecordingView::default();
        pipeline.stop_handle().stop();

        let outcome = pipeline.send("oi", &mut view).await;

        assert_eq!(outcome, TurnOutcome::Completed { stopped: false });
        assert_eq!(view.frames.last().map(String::as_str), Some("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_shows_apology_and_returns_to_idle() {
        let client = ScriptedClient::replying(&[Err("503")]);
        let mut pipeline = pipeline(client);
        let mut view = RecordingView::default();

        let outcome = pipeline.send("oi", &mut view).await;

        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(pipeline.history().len(), 1);
        assert_eq!(view.frames.last().map(String::as_str), Some(ERROR_APOLOGY));
        assert_eq!(view.input_enabled.last(), Some(&true));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reply_is_a_failure() {
        let client = ScriptedClient::replying(&[Ok("  ")]);
        let mut pipeline = pipeline(client);
        let mut view = RecordingView::default();

        assert_eq!(pipeline.send("oi", &mut view).await, TurnOutcome::Failed);
        assert_eq!(pipeline.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_sends_nothing() {
        let client = ScriptedClient::replying(&[Ok("x")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();

        assert_eq!(pipeline.send("  ", &mut view).await, TurnOutcome::Empty);
        assert!(pipeline.history().is_empty());
        assert!(client.requests().is_empty());
        assert!(view.events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_pipeline_rejects_send() {
        let client = ScriptedClient::replying(&[Ok("x")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();
        pipeline.state.send_replace(PipelineState::Typing);

        assert_eq!(pipeline.send("oi", &mut view).await, TurnOutcome::Rejected);
        assert_eq!(pipeline.regenerate(&mut view).await, TurnOutcome::Rejected);
        assert!(pipeline.history().is_empty());
        assert!(client.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_full_reply_in_history() {
        let client = ScriptedClient::replying(&[Ok("uma resposta longa")]);
        let mut pipeline = pipeline(client);
        let mut view = RecordingView {
            stop_after: Some((2, pipeline.stop_handle())),
            ..RecordingView::default()
        };

        let outcome = pipeline.send("oi", &mut view).await;

        assert_eq!(outcome, TurnOutcome::Completed { stopped: true });
        assert_eq!(view.frames, vec!["u", "um"]);
        assert_eq!(text_of(&pipeline.history().messages()[1]), "uma resposta longa");
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_year_question_is_answered_locally() {
        let client = ScriptedClient::replying(&[Ok("Certo.")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();

        pipeline.send("Que ano é esse?", &mut view).await;

        let sent = client.requests()[0].messages[1].clone();
        let text = text_of(&sent);
        assert!(text.starts_with("O ano atual é "), "{}", text);
        assert!(text.ends_with(" em Recife, Brasil"), "{}", text);
        assert_eq!(view.events[0], "user:Que ano é esse?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_pruned_before_each_request() {
        let client = ScriptedClient::replying(&[Ok("a"), Ok("b"), Ok("c")]);
        let chat = ChatConfig {
            max_history: 3,
            min_history_to_keep: 1,
            ..ChatConfig::default()
        };
        let mut pipeline = pipeline_with(client.clone(), chat);
        let mut view = RecordingView::default();

        for text in ["um", "dois", "três"] {
            pipeline.send(text, &mut view).await;
        }

        for request in client.requests() {
            assert!(request.messages.len() <= 4);
        }
        let last = client.requests().pop().unwrap();
        assert_eq!(text_of(&last.messages[1]), "um");
        assert_eq!(text_of(&last.messages[3]), "três");
    }

    #[tokio::test(start_paused = true)]
    async fn test_attachments_cleared_after_send() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dados.csv");
        fs::write(&path, "a,b").unwrap();

        let client = ScriptedClient::replying(&[Ok("ok")]);
        let mut pipeline = pipeline(client.clone());
        let mut view = RecordingView::default();

        assert_eq!(pipeline.attach_file(&path).unwrap().name, "dados.csv");
        pipeline.send("", &mut view).await;

        assert!(pipeline.pending_file().is_none());
        assert_eq!(view.events[0], "user:Arquivo enviado: dados.csv");
        assert!(text_of(&client.requests()[0].messages[1]).ends_with("\n\na,b"));
    }

    #[test]
    fn test_oversized_attachment_leaves_session_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grande.txt");
        fs::write(&path, vec![b'x'; 64]).unwrap();

        let mut pipeline = pipeline(ScriptedClient::replying(&[]));
        pipeline.ai.max_file_size = 16;

        assert!(pipeline.attach_file(&path).is_err());
        assert!(pipeline.pending_file().is_none());
    }
}
