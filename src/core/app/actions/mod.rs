mod conversation;
mod streaming;
mod tool_calls;

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

use super::{App, SessionSnapshot};
use crate::core::chat_stream::{StreamFragment, StreamParams};
use crate::core::message::{Message, ToolCallRequest};

#[derive(Debug)]
pub enum AppAction {
    SubmitMessage {
        message: String,
    },
    StreamFragment {
        fragment: StreamFragment,
        stream_id: u64,
    },
    ToolCallCompleted {
        tool_name: String,
        result: String,
        display: Option<String>,
    },
    SelectModel {
        model: String,
    },
    NewConversation,
    LoadConversation {
        model: String,
        messages: Vec<Message>,
        handle: Option<PathBuf>,
    },
    SessionPersisted {
        started_at: DateTime<Local>,
        handle: PathBuf,
    },
}

/// Side effects the orchestrator asks its owner to perform.
#[derive(Debug)]
pub enum AppCommand {
    SpawnStream(StreamParams),
    RunTool(ToolCallRequest),
    PersistSession(SessionSnapshot),
}

/// Sending half of the orchestrator's action channel, handed to workers.
#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppAction>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppAction>) -> Self {
        Self { tx }
    }

    /// Returns false once the receiving side has gone away.
    pub fn dispatch(&self, action: AppAction) -> bool {
        self.tx.send(action).is_ok()
    }
}

pub fn apply_actions(app: &mut App, actions: impl IntoIterator<Item = AppAction>) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for action in actions {
        if let Some(cmd) = apply_action(app, action) {
            commands.push(cmd);
        }
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SubmitMessage { .. } | AppAction::StreamFragment { .. } => {
            streaming::handle_streaming_action(app, action)
        }

        AppAction::ToolCallCompleted {
            tool_name,
            result,
            display,
        } => tool_calls::handle_tool_call_completed(app, tool_name, result, display),

        AppAction::SelectModel { .. }
        | AppAction::NewConversation
        | AppAction::LoadConversation { .. }
        | AppAction::SessionPersisted { .. } => {
            conversation::handle_conversation_action(app, action)
        }
    }
}
