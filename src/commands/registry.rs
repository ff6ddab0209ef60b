use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "models",
        usage: "/models",
        help: "List models installed on the server.",
        handler: super::handle_models,
    },
    Command {
        name: "model",
        usage: "/model <name>",
        help: "Switch to another model.",
        handler: super::handle_model,
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Save this conversation and start a new one.",
        handler: super::handle_new,
    },
    Command {
        name: "history",
        usage: "/history",
        help: "List saved conversations.",
        handler: super::handle_history,
    },
    Command {
        name: "load",
        usage: "/load <number>",
        help: "Load a saved conversation from the /history list.",
        handler: super::handle_load,
    },
    Command {
        name: "log",
        usage: "/log [filename]",
        help: "Toggle the transcript log or set its file.",
        handler: super::handle_log,
    },
    Command {
        name: "status",
        usage: "/status",
        help: "Show connection, model and logging status.",
        handler: super::handle_status,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Exit.",
        handler: super::handle_quit,
    },
    Command {
        name: "exit",
        usage: "/exit",
        help: "Exit.",
        handler: super::handle_quit,
    },
];
