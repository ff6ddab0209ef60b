//! Conversation orchestrator
//!
//! [`App`] owns the conversation and the state of the current turn. It is
//! driven entirely by [`AppAction`]s applied on one task; background work
//! (streaming, tool execution, persistence) is requested by returning an
//! [`AppCommand`] and reports back with further actions.

use std::collections::VecDeque;

use thiserror::Error;

use crate::core::chat_stream::StreamParams;
use crate::core::message::{Message, ToolCallRequest};
use crate::tools::ToolDefinition;
use crate::utils::logging::LoggingState;

pub mod actions;
pub mod session;
pub mod ui_state;


pub use actions::{apply_action, apply_actions, AppAction, AppActionDispatcher, AppCommand};
pub use session::{ConversationSession, SessionSnapshot};
pub use ui_state::{DisplayEvent, UiState};

pub struct AppInitConfig {
    pub model: Option<String>,
    pub autosave: bool,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStage {
    /// Answering the user's message.
    Initial,
    /// Answering after tool results were appended. Tool calls requested
    /// here are not serviced.
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Streaming(StreamStage),
    ToolDispatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Please select a model first")]
    NoModelSelected,
    #[error("Already processing a message")]
    Busy,
}

/// Bookkeeping for the turn in flight.
#[derive(Debug, Default)]
pub struct TurnState {
    pub phase: TurnPhase,
    pub current_stream_id: u64,
    /// Text received so far on the current stream.
    pub response: String,
    /// Tool calls received so far on the current stream.
    pub pending_tool_calls: Vec<ToolCallRequest>,
    pub tool_queue: VecDeque<ToolCallRequest>,
    pub active_tool: Option<String>,
}

pub struct App {
    pub session: ConversationSession,
    pub ui: UiState,
    pub logging: LoggingState,
    pub turn: TurnState,
    pub tool_definitions: Vec<ToolDefinition>,
    pub autosave: bool,
}

impl App {
    pub fn new(config: AppInitConfig, tool_definitions: Vec<ToolDefinition>) -> Self {
        Self {
            session: ConversationSession::new(config.model),
            ui: UiState::default(),
            logging: LoggingState::new(config.log_file),
            turn: TurnState::default(),
            tool_definitions,
            autosave: config.autosave,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.turn.phase
    }

    pub fn is_busy(&self) -> bool {
        self.turn.phase != TurnPhase::Idle
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        matches!(self.turn.phase, TurnPhase::Streaming(_))
            && stream_id == self.turn.current_stream_id
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn model(&self) -> Option<&str> {
        self.session.model.as_deref()
    }

    /// Check a submission without touching any state.
    pub fn validate_submission(&self, message: &str) -> Result<(), SubmitError> {
        if message.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.session.model.is_none() {
            return Err(SubmitError::NoModelSelected);
        }
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }
        Ok(())
    }

    /// Append to history and to the transcript log.
    pub(crate) fn append_message(&mut self, message: Message) {
        if let Err(err) = self.logging.log_entry(&message) {
            tracing::warn!(error = %err, "Failed to write transcript log");
        }
        self.session.push(message);
    }

    /// Open the next stream of this turn over the full history.
    pub(crate) fn begin_stream(&mut self, stage: StreamStage) -> StreamParams {
        self.turn.current_stream_id = self.turn.current_stream_id.wrapping_add(1);
        self.turn.phase = TurnPhase::Streaming(stage);
        self.turn.response.clear();
        self.turn.pending_tool_calls.clear();
        self.ui.push(DisplayEvent::AssistantStarted);
        self.ui.set_status("Thinking...");

        StreamParams {
            model: self.session.model.clone().unwrap_or_default(),
            messages: self.session.messages().to_vec(),
            tools: self.tool_definitions.clone(),
            stream_id: self.turn.current_stream_id,
        }
    }
}
