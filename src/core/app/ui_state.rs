use std::collections::VecDeque;

use crate::core::message::Message;

/// Something the front end should show. The orchestrator only queues these;
/// rendering them is the front end's business.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    UserMessage(String),
    AssistantStarted,
    AssistantDelta(String),
    ToolCallStarted {
        name: String,
        arguments: String,
    },
    ToolResult {
        name: String,
        content: String,
        /// Tool-provided rendering, shown instead of the raw JSON.
        display: Option<String>,
    },
    Error(String),
    Info(String),
    Warning(String),
    TurnFinished,
    ConversationCleared,
    /// A stored message replayed after loading a conversation.
    HistoryMessage(Message),
}

#[derive(Debug, Default)]
pub struct UiState {
    events: VecDeque<DisplayEvent>,
    pub status: Option<String>,
}

impl UiState {
    pub fn push(&mut self, event: DisplayEvent) {
        self.events.push_back(event);
    }

    pub fn drain_events(&mut self) -> Vec<DisplayEvent> {
        self.events.drain(..).collect()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }
}
