use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::debug;

use super::{App, AppAction, AppCommand};
use crate::core::app::DisplayEvent;
use crate::core::message::Message;

pub(super) fn handle_conversation_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    if let AppAction::SessionPersisted { started_at, handle } = action {
        record_persisted(app, started_at, handle);
        return None;
    }

    if app.is_busy() {
        app.ui.push(DisplayEvent::Warning(
            "Wait for the current response to finish first".to_string(),
        ));
        return None;
    }

    match action {
        AppAction::SelectModel { model } => {
            app.ui.push(DisplayEvent::Info(format!("Using model: {model}")));
            app.session.model = Some(model);
            None
        }
        AppAction::NewConversation => new_conversation(app),
        AppAction::LoadConversation {
            model,
            messages,
            handle,
        } => {
            load_conversation(app, model, messages, handle);
            None
        }
        _ => unreachable!("non-conversation action routed to conversation handler"),
    }
}

fn new_conversation(app: &mut App) -> Option<AppCommand> {
    let previous = app.session.snapshot();
    app.session.reset();
    app.ui.push(DisplayEvent::ConversationCleared);
    app.ui.push(DisplayEvent::Info("New chat started".to_string()));
    previous.map(AppCommand::PersistSession)
}

fn load_conversation(app: &mut App, model: String, messages: Vec<Message>, handle: Option<PathBuf>) {
    app.ui.push(DisplayEvent::ConversationCleared);
    for message in &messages {
        app.ui.push(DisplayEvent::HistoryMessage(message.clone()));
    }
    app.ui.push(DisplayEvent::Info(format!(
        "Chat loaded ({model}, {} messages)",
        messages.len()
    )));
    app.session.replace(model, messages, handle);
}

/// Remember where the session was saved so later saves reuse the file.
/// Saves of an earlier conversation (after /new or /load) are ignored.
fn record_persisted(app: &mut App, started_at: DateTime<Local>, handle: PathBuf) {
    if app.session.started_at == Some(started_at) {
        app.session.handle = Some(handle);
    } else {
        debug!(path = %handle.display(), "Saved a conversation that is no longer active");
    }
}
