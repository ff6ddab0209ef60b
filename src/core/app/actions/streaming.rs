use tracing::{debug, warn};

use super::{tool_calls, App, AppAction, AppCommand};
use crate::core::app::{DisplayEvent, StreamStage, SubmitError, TurnPhase};
use crate::core::chat_stream::StreamFragment;
use crate::core::message::Message;

pub(super) fn handle_streaming_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SubmitMessage { message } => submit_message(app, message),
        AppAction::StreamFragment {
            fragment,
            stream_id,
        } => {
            if !app.is_current_stream(stream_id) {
                debug!(stream_id, "Ignoring fragment from a stale stream");
                return None;
            }
            apply_fragment(app, fragment)
        }
        _ => unreachable!("non-streaming action routed to streaming handler"),
    }
}

fn submit_message(app: &mut App, message: String) -> Option<AppCommand> {
    match app.validate_submission(&message) {
        Ok(()) => {}
        Err(SubmitError::EmptyInput) => return None,
        Err(err) => {
            app.ui.push(DisplayEvent::Warning(err.to_string()));
            return None;
        }
    }

    let text = message.trim().to_string();
    app.session.mark_started();
    app.ui.push(DisplayEvent::UserMessage(text.clone()));
    app.append_message(Message::user(text));

    let params = app.begin_stream(StreamStage::Initial);
    Some(AppCommand::SpawnStream(params))
}

fn apply_fragment(app: &mut App, fragment: StreamFragment) -> Option<AppCommand> {
    match fragment {
        StreamFragment::ContentDelta(text) => {
            app.turn.response.push_str(&text);
            app.ui.push(DisplayEvent::AssistantDelta(text));
            None
        }
        StreamFragment::ToolCalls(calls) => {
            // Not dispatched until the stream completes; a call may be split
            // across several fragments of one turn.
            app.turn.pending_tool_calls.extend(calls);
            None
        }
        StreamFragment::Done => complete_stream(app),
        StreamFragment::Error(message) => handle_stream_error(app, message),
    }
}

fn complete_stream(app: &mut App) -> Option<AppCommand> {
    let stage = match app.turn.phase {
        TurnPhase::Streaming(stage) => stage,
        _ => return None,
    };
    let text = std::mem::take(&mut app.turn.response);
    let calls = std::mem::take(&mut app.turn.pending_tool_calls);

    if calls.is_empty() {
        app.append_message(Message::assistant(text));
        return finish_turn(app);
    }

    match stage {
        StreamStage::Initial => {
            app.append_message(Message::assistant_with_tool_calls(text, calls.clone()));
            tool_calls::begin_tool_dispatch(app, calls)
        }
        StreamStage::Final => {
            let names: Vec<&str> = calls.iter().map(|call| call.name.as_str()).collect();
            warn!(tools = ?names, "Model requested tools after tool results; not serviced");
            app.ui.push(DisplayEvent::Warning(format!(
                "Model requested more tool calls ({}); only one round of tools runs per message",
                names.join(", ")
            )));
            app.append_message(Message::assistant(text));
            finish_turn(app)
        }
    }
}

fn handle_stream_error(app: &mut App, message: String) -> Option<AppCommand> {
    app.ui.push(DisplayEvent::Error(message));

    let text = std::mem::take(&mut app.turn.response);
    let dropped = std::mem::take(&mut app.turn.pending_tool_calls);
    if !dropped.is_empty() {
        debug!(count = dropped.len(), "Dropping tool calls from failed stream");
    }
    if !text.is_empty() {
        app.append_message(Message::assistant(text));
    }
    finish_turn(app)
}

/// Back to idle; request a save when autosave is on.
pub(super) fn finish_turn(app: &mut App) -> Option<AppCommand> {
    app.turn.phase = TurnPhase::Idle;
    app.turn.tool_queue.clear();
    app.turn.active_tool = None;
    app.ui.set_status("Ready");
    app.ui.push(DisplayEvent::TurnFinished);

    if !app.autosave {
        return None;
    }
    app.session.snapshot().map(AppCommand::PersistSession)
}
