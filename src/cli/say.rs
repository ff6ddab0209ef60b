//! Non-interactive "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::core::app::{apply_action, AppAction, DisplayEvent};
use crate::core::client::describe_transport_failure;
use crate::core::config::ResolvedConfig;
use crate::core::message::Message;
use crate::tools::ToolRegistry;
use crate::ui::chat_loop::drive_until_idle;
use crate::ui::chat_loop::setup::{announce_startup, build_runtime, client_for};
use crate::ui::renderer::{RenderStyle, TranscriptRenderer};

pub async fn run_say(
    prompt: Vec<String>,
    no_stream: bool,
    config: ResolvedConfig,
    log_file: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: ollama-chat say <prompt>");
        std::process::exit(1);
    }

    if no_stream {
        return say_once(&prompt, &config).await;
    }

    let mut runtime = build_runtime(&config, log_file, ToolRegistry::with_default_tools(), false)?;
    if runtime.app.model().is_none() {
        announce_startup(&mut runtime).await;
        for event in runtime.app.ui.drain_events() {
            if let DisplayEvent::Warning(message) = event {
                eprintln!("⚠️  {message}");
            }
        }
    }

    if let Err(err) = runtime.app.validate_submission(&prompt) {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
    if let Some(command) = apply_action(&mut runtime.app, AppAction::SubmitMessage { message: prompt }) {
        runtime.executor.execute(command);
    }

    let mut renderer = TranscriptRenderer::new(io::stdout(), RenderStyle::Plain);
    let mut failure: Option<String> = None;
    drive_until_idle(&mut runtime, |app| {
        for event in app.ui.drain_events() {
            match event {
                DisplayEvent::Error(message) => failure = Some(message),
                DisplayEvent::Warning(message) => eprintln!("⚠️  {message}"),
                other => renderer.render(&other)?,
            }
        }
        io::stdout().flush()
    })
    .await?;
    println!();

    if let Some(message) = failure {
        eprintln!("\n❌ Error: {message}");
        std::process::exit(1);
    }
    Ok(())
}

/// Single request on the non-streaming endpoint, without tools.
async fn say_once(prompt: &str, config: &ResolvedConfig) -> Result<(), Box<dyn Error>> {
    let client = client_for(config)?;
    let model = match &config.model {
        Some(model) => model.clone(),
        None => match client.list_models().await.into_iter().next() {
            Some(first) => first.name,
            None => return Err("No model configured and none installed".into()),
        },
    };

    match client.chat(&model, &[Message::user(prompt)], &[]).await {
        Ok(response) => {
            let content = response
                .message
                .and_then(|message| message.content)
                .unwrap_or_default();
            println!("{content}");
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ Error: {}", describe_transport_failure(&err));
            std::process::exit(1);
        }
    }
}
