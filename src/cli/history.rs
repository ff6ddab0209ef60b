//! `history list|show` subcommands

use std::error::Error;

use crate::core::config::{path_display, ResolvedConfig};
use crate::core::history::ChatHistory;
use crate::core::message::Role;
use crate::ui::chat_loop::format_listing;

pub fn list_history(config: &ResolvedConfig) -> Result<(), Box<dyn Error>> {
    let history = ChatHistory::new(&config.history_dir);
    println!("📁 {}", path_display(history.dir()));
    println!("{}", format_listing(&history.list()));
    Ok(())
}

/// Print one saved conversation, addressed by its 1-based position in the
/// listing.
pub fn show_history(config: &ResolvedConfig, index: usize) -> Result<(), Box<dyn Error>> {
    let history = ChatHistory::new(&config.history_dir);
    let listing = history.list();
    let summary = index
        .checked_sub(1)
        .and_then(|i| listing.get(i))
        .ok_or_else(|| format!("No saved conversation #{index} ({} saved)", listing.len()))?;

    let saved = history.load(&summary.path)?;
    println!(
        "Model: {}  Started: {}  ({} messages)",
        saved.model,
        summary.display_timestamp(),
        saved.messages.len()
    );
    for message in &saved.messages {
        match message.role {
            Role::Tool => println!(
                "\n[{} result]\n{}",
                message.tool_name.as_deref().unwrap_or("tool"),
                message.content
            ),
            role => {
                println!("\n{}: {}", role.display_label(), message.content);
                for call in message.tool_calls.iter().flatten() {
                    let label = format!("{} {}", call.name, call.arguments_summary());
                    println!("[Calling tool: {}]", label.trim_end());
                }
            }
        }
    }
    Ok(())
}
