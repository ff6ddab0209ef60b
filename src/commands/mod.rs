mod registry;

pub use registry::{all_commands, CommandInvocation};

use crate::core::app::{App, AppAction, DisplayEvent};

#[derive(Debug)]
pub enum CommandResult {
    Continue,
    Quit,
    ProcessAsMessage(String),
    Action(AppAction),
    ListModels,
    ShowHistory,
    /// 1-based index into the last `/history` listing.
    LoadHistory(usize),
    ShowStatus,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return CommandResult::ProcessAsMessage(input.to_string());
    }

    let mut parts = trimmed[1..].splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    if let Some(command) = registry::find_command(command_name) {
        let invocation = CommandInvocation {
            input: trimmed,
            args,
        };
        (command.handler)(app, invocation)
    } else {
        CommandResult::ProcessAsMessage(input.to_string())
    }
}

fn info(app: &mut App, message: impl Into<String>) {
    app.ui.push(DisplayEvent::Info(message.into()));
}

pub(super) fn handle_help(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let mut lines = vec!["Commands:".to_string()];
    for command in all_commands() {
        lines.push(format!("  {:<16} {}", command.usage, command.help));
    }
    lines.push("Anything else is sent to the model.".to_string());
    info(app, lines.join("\n"));
    CommandResult::Continue
}

pub(super) fn handle_models(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::ListModels
}

pub(super) fn handle_model(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    match invocation.args.split_whitespace().next() {
        Some(model) => CommandResult::Action(AppAction::SelectModel {
            model: model.to_string(),
        }),
        None => {
            let current = app.model().unwrap_or("(none)").to_string();
            info(app, format!("Current model: {current}. Usage: /model <name>"));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_new(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Action(AppAction::NewConversation)
}

pub(super) fn handle_history(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::ShowHistory
}

pub(super) fn handle_load(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    match invocation.args.parse::<usize>() {
        Ok(index) if index > 0 => CommandResult::LoadHistory(index),
        _ => {
            app.ui
                .push(DisplayEvent::Warning("Usage: /load <number>".to_string()));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_log(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let parts: Vec<&str> = invocation.args.split_whitespace().collect();

    let result = match parts.as_slice() {
        [] => app.logging.toggle_logging(),
        [filename] => app.logging.set_log_file(filename.to_string()),
        _ => {
            app.ui
                .push(DisplayEvent::Warning("Usage: /log [filename]".to_string()));
            return CommandResult::Continue;
        }
    };
    match result {
        Ok(message) => info(app, message),
        Err(e) => app.ui.push(DisplayEvent::Warning(format!("Log error: {e}"))),
    }
    CommandResult::Continue
}

pub(super) fn handle_status(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::ShowStatus
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
