//! Interactive chat loop
//!
//! Reads stdin lines and worker actions on one task, applies them to the
//! [`App`], hands resulting commands to the executor and renders whatever
//! display events were queued.

pub mod executors;
pub mod setup;

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::api::models::format_model_size;
use crate::commands::{process_input, CommandResult};
use crate::core::app::{apply_action, apply_actions, App, AppAction, DisplayEvent};
use crate::core::config::{path_display, ResolvedConfig};
use crate::core::history::ChatSummary;
use crate::tools::ToolRegistry;
use crate::ui::renderer::{RenderStyle, TranscriptRenderer};

use setup::{announce_startup, build_runtime, ChatRuntime};

pub struct ChatSettings {
    pub config: ResolvedConfig,
    pub log_file: Option<String>,
}

enum LoopControl {
    Continue,
    Quit,
}

pub async fn run_chat(settings: ChatSettings) -> Result<(), Box<dyn Error>> {
    let ChatSettings { config, log_file } = settings;
    let mut runtime = build_runtime(
        &config,
        log_file,
        ToolRegistry::with_default_tools(),
        config.autosave,
    )?;
    let mut renderer = TranscriptRenderer::new(io::stdout(), RenderStyle::Transcript);

    println!("Ollama Chat. Type /help for commands, /quit to exit.");
    announce_startup(&mut runtime).await;
    renderer.render_all(runtime.app.ui.drain_events())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut listing: Vec<ChatSummary> = Vec::new();
    let mut stdin_open = true;
    let mut prompt_shown = false;

    loop {
        if stdin_open && !prompt_shown && !runtime.app.is_busy() {
            print!("\nUser: ");
            io::stdout().flush()?;
            prompt_shown = true;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                prompt_shown = false;
                match line {
                    Ok(Some(line)) => {
                        if let LoopControl::Quit = handle_line(&mut runtime, &mut listing, &line).await {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(err) => {
                        warn!(error = %err, "Failed to read from stdin");
                        stdin_open = false;
                    }
                }
            }
            Some(action) = runtime.action_rx.recv() => apply_pending(&mut runtime, action),
        }

        renderer.render_all(runtime.app.ui.drain_events())?;

        // Input is gone: let the current turn finish, then leave.
        if !stdin_open && !runtime.app.is_busy() {
            break;
        }
    }

    println!();
    // Let saves from the last turn land before exiting.
    runtime.executor.wait_for_background().await;
    Ok(())
}

async fn handle_line(
    runtime: &mut ChatRuntime,
    listing: &mut Vec<ChatSummary>,
    line: &str,
) -> LoopControl {
    let result = process_input(&mut runtime.app, line);
    match result {
        CommandResult::Continue => {}
        CommandResult::Quit => return LoopControl::Quit,
        CommandResult::ProcessAsMessage(message) => {
            dispatch(runtime, AppAction::SubmitMessage { message });
        }
        CommandResult::Action(action) => dispatch(runtime, action),
        CommandResult::ListModels => {
            let models = runtime.client.list_models().await;
            let info = if models.is_empty() {
                "No models available (is Ollama running?)".to_string()
            } else {
                let mut lines = vec!["Available models:".to_string()];
                lines.extend(models.iter().map(|model| {
                    let size = model.size.map(format_model_size).unwrap_or_default();
                    format!("  {:<32} {}", model.name, size)
                }));
                lines.join("\n")
            };
            runtime.app.ui.push(DisplayEvent::Info(info));
        }
        CommandResult::ShowHistory => {
            *listing = runtime.history.list();
            let info = format_listing(listing);
            runtime.app.ui.push(DisplayEvent::Info(info));
        }
        CommandResult::LoadHistory(index) => load_from_listing(runtime, listing, index),
        CommandResult::ShowStatus => {
            let connected = runtime.client.is_available().await;
            let app = &runtime.app;
            let lines = [
                format!(
                    "Ollama: {} ({})",
                    if connected { "connected" } else { "not reachable" },
                    runtime.client.base_url()
                ),
                format!("Model: {}", app.model().unwrap_or("(none)")),
                format!("State: {}", app.ui.status.as_deref().unwrap_or("Ready")),
                format!("Messages: {}", app.messages().len()),
                format!("Logging: {}", app.logging.get_status_string()),
                format!("History: {}", path_display(runtime.history.dir())),
            ];
            runtime.app.ui.push(DisplayEvent::Info(lines.join("\n")));
        }
    }
    LoopControl::Continue
}

fn dispatch(runtime: &mut ChatRuntime, action: AppAction) {
    if let Some(command) = apply_action(&mut runtime.app, action) {
        runtime.executor.execute(command);
    }
}

/// Apply `first` plus whatever else is already queued, then run the
/// resulting commands.
fn apply_pending(runtime: &mut ChatRuntime, first: AppAction) {
    let mut batch = vec![first];
    while let Ok(action) = runtime.action_rx.try_recv() {
        batch.push(action);
    }
    let commands = apply_actions(&mut runtime.app, batch);
    runtime.executor.execute_all(commands);
}

pub(crate) fn format_listing(listing: &[ChatSummary]) -> String {
    if listing.is_empty() {
        return "No saved conversations.".to_string();
    }
    let mut lines = vec!["Saved conversations:".to_string()];
    for (i, chat) in listing.iter().enumerate() {
        lines.push(format!(
            "  {:>3}. {}  {}  ({} messages)",
            i + 1,
            chat.display_timestamp(),
            chat.model,
            chat.message_count
        ));
    }
    lines.push("Use /load <number> to continue one.".to_string());
    lines.join("\n")
}

fn load_from_listing(runtime: &mut ChatRuntime, listing: &[ChatSummary], index: usize) {
    let Some(summary) = listing.get(index - 1) else {
        runtime.app.ui.push(DisplayEvent::Warning(
            "No such conversation. Run /history first.".to_string(),
        ));
        return;
    };
    match runtime.history.load(&summary.path) {
        Ok(saved) => dispatch(
            runtime,
            AppAction::LoadConversation {
                model: saved.model,
                messages: saved.messages,
                handle: Some(summary.path.clone()),
            },
        ),
        Err(err) => runtime
            .app
            .ui
            .push(DisplayEvent::Error(format!("Could not load conversation: {err}"))),
    }
}

/// Apply queued actions until the app goes idle. Used by one-shot turns.
pub(crate) async fn drive_until_idle(
    runtime: &mut ChatRuntime,
    mut on_events: impl FnMut(&mut App) -> io::Result<()>,
) -> io::Result<()> {
    on_events(&mut runtime.app)?;
    while runtime.app.is_busy() {
        let Some(action) = runtime.action_rx.recv().await else {
            break;
        };
        apply_pending(runtime, action);
        on_events(&mut runtime.app)?;
    }
    Ok(())
}
