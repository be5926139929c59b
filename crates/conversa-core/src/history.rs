use tracing::debug;

use crate::error::{ChatError, Result};
use crate::state::{ChatMessage, ChatRole};

/// Bounds applied to the history before each outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrunePolicy {
    pub max_history: usize,
    pub min_to_keep: usize,
    pub preserve_initial_context: bool,
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self {
            max_history: 50,
            min_to_keep: 10,
            preserve_initial_context: true,
        }
    }
}

/// Ordered transcript of role-tagged messages sent to the completion service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn append(&mut self, message: ChatMessage) -> Result<()> {
        if message.content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Drop older messages so that at most `policy.max_history` remain.
    ///
    /// With `preserve_initial_context` the first message survives and the
    /// most recent `max_history - 1` follow it. Survivors keep their order.
    pub fn prune(&mut self, policy: &PrunePolicy) {
        let len = self.messages.len();
        if len <= policy.max_history {
            return;
        }

        if policy.preserve_initial_context && len > policy.min_to_keep && policy.max_history > 0 {
            let keep_recent = policy.max_history - 1;
            self.messages.drain(1..len - keep_recent);
        } else {
            self.messages.drain(..len - policy.max_history);
        }
        debug!(before = len, after = self.messages.len(), "pruned conversation history");
    }

    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|msg| msg.role == ChatRole::Assistant)
    }

    pub fn pop_last(&mut self) -> Option<ChatMessage> {
        self.messages.pop()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.last_mut()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
