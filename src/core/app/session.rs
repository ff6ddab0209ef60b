use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::core::message::Message;

/// The conversation itself: ordered history plus the selected model.
///
/// History is append-only from outside the orchestrator; it is replaced
/// wholesale only by starting or loading a conversation.
#[derive(Debug, Default)]
pub struct ConversationSession {
    pub model: Option<String>,
    messages: Vec<Message>,
    /// When the first message was submitted; names the history file.
    pub started_at: Option<DateTime<Local>>,
    /// Where this conversation was last saved or loaded from.
    pub handle: Option<PathBuf>,
}

/// Read-only copy of a session handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub model: String,
    pub messages: Vec<Message>,
    pub started_at: DateTime<Local>,
    pub handle: Option<PathBuf>,
}

impl ConversationSession {
    pub fn new(model: Option<String>) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(super) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Start over with the same model.
    pub(super) fn reset(&mut self) {
        self.messages.clear();
        self.started_at = None;
        self.handle = None;
    }

    pub(super) fn replace(
        &mut self,
        model: String,
        messages: Vec<Message>,
        handle: Option<PathBuf>,
    ) {
        self.model = Some(model);
        self.messages = messages;
        self.started_at = Some(Local::now());
        self.handle = handle;
    }

    pub(super) fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Local::now());
        }
    }

    /// Nothing to save without a model or any messages.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let model = self.model.clone()?;
        if self.messages.is_empty() {
            return None;
        }
        Some(SessionSnapshot {
            model,
            messages: self.messages.clone(),
            started_at: self.started_at.unwrap_or_else(Local::now),
            handle: self.handle.clone(),
        })
    }
}
