use tokio::sync::mpsc::UnboundedSender;

use conversa_core::{ChatView, RenderTarget};

use crate::tui::{AppEvent, ViewUpdate};

/// Forwards everything the pipeline does to the transcript into the event
/// loop, so a turn can run on its own task while the UI keeps drawing.
pub struct ChannelView {
    tx: UnboundedSender<AppEvent>,
}

impl ChannelView {
    pub fn new(tx: UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    fn post(&self, update: ViewUpdate) {
        // The loop is gone only while shutting down.
        let _ = self.tx.send(AppEvent::View(update));
    }
}

impl RenderTarget for ChannelView {
    fn render(&mut self, markup: &str) {
        self.post(ViewUpdate::Frame(markup.to_string()));
    }
}

impl ChatView for ChannelView {
    fn show_user_message(&mut self, text: &str) {
        self.post(ViewUpdate::UserMessage(text.to_string()));
    }

    fn begin_assistant_message(&mut self, timestamp_label: &str) {
        self.post(ViewUpdate::BeginAssistant {
            timestamp: timestamp_label.to_string(),
        });
    }

    fn finish_assistant_message(&mut self) {
        self.post(ViewUpdate::FinishAssistant);
    }

    fn remove_last_assistant_message(&mut self) {
        self.post(ViewUpdate::RemoveLastAssistant);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.post(ViewUpdate::InputEnabled(enabled));
    }
}
