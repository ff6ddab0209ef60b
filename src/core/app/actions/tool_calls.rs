use tracing::debug;

use super::{App, AppCommand};
use crate::core::app::{DisplayEvent, StreamStage, TurnPhase};
use crate::core::message::{Message, ToolCallRequest};

/// Queue the calls from the initial stream and issue the first one.
pub(super) fn begin_tool_dispatch(app: &mut App, calls: Vec<ToolCallRequest>) -> Option<AppCommand> {
    app.turn.phase = TurnPhase::ToolDispatch;
    app.turn.tool_queue = calls.into();
    advance_tool_queue(app)
}

/// One call in flight at a time, in the order the model asked for them.
/// Once the queue is empty, the final stream opens.
fn advance_tool_queue(app: &mut App) -> Option<AppCommand> {
    match app.turn.tool_queue.pop_front() {
        Some(call) => {
            app.turn.active_tool = Some(call.name.clone());
            app.ui.set_status(format!("Running tool: {}", call.name));
            app.ui.push(DisplayEvent::ToolCallStarted {
                name: call.name.clone(),
                arguments: call.arguments_summary(),
            });
            Some(AppCommand::RunTool(call))
        }
        None => {
            app.turn.active_tool = None;
            let params = app.begin_stream(StreamStage::Final);
            Some(AppCommand::SpawnStream(params))
        }
    }
}

pub(super) fn handle_tool_call_completed(
    app: &mut App,
    tool_name: String,
    result: String,
    display: Option<String>,
) -> Option<AppCommand> {
    if app.turn.phase != TurnPhase::ToolDispatch
        || app.turn.active_tool.as_deref() != Some(tool_name.as_str())
    {
        debug!(tool = %tool_name, "Ignoring result for a tool that is not running");
        return None;
    }

    app.ui.push(DisplayEvent::ToolResult {
        name: tool_name.clone(),
        content: result.clone(),
        display,
    });
    app.append_message(Message::tool_result(tool_name, result));
    advance_tool_queue(app)
}
