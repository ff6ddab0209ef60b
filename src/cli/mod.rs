//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, resolves configuration and
//! dispatches to the interactive chat loop or one of the one-shot commands.

pub mod history;
pub mod model_list;
pub mod say;
pub mod tools;


use std::error::Error;

use clap::{Parser, Subcommand};

use crate::cli::history::{list_history, show_history};
use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::cli::tools::{list_tools, run_tool};
use crate::core::config::{data_dir, path_display, Config, ConfigOverrides, ResolvedConfig};
use crate::logging::{init_tracing, log_file_path};
use crate::tools::ToolRegistry;
use crate::ui::chat_loop::{run_chat, ChatSettings};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
    "\ntarget: ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

#[derive(Parser)]
#[command(name = "ollama-chat")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Chat with a local Ollama server from the terminal")]
#[command(
    long_about = "ollama-chat is a line-oriented chat client for an Ollama server. Replies \
stream as they are generated, and the model may call built-in tools (such as live \
cryptocurrency prices) before answering.\n\n\
Environment Variables:\n\
  OLLAMA_HOST       Server address used when --base-url is not given\n\
  RUST_LOG          Diagnostic log filter (overrides the configured log level)\n\n\
Commands inside a chat:\n\
  /help             Show all commands\n\
  /models           List installed models\n\
  /model <name>     Switch model\n\
  /new              Save and start a new conversation\n\
  /history          List saved conversations\n\
  /load <number>    Continue a saved conversation\n\
  /log [filename]   Toggle or set the transcript log\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to chat with
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Ollama server URL, e.g. http://localhost:11434
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Append the conversation transcript to a file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,

    /// Send diagnostics to stderr instead of the log file
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send one prompt and print the reply
    Say {
        /// Use the non-streaming endpoint; tools are not offered
        #[arg(long)]
        no_stream: bool,
        /// Prompt text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List models installed on the server
    Models,
    /// Browse saved conversations
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },
    /// Inspect or run the built-in tools
    Tools {
        #[command(subcommand)]
        command: Option<ToolCommands>,
    },
    /// Show or edit the configuration file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List saved conversations, newest first
    List,
    /// Print a saved conversation
    Show {
        /// Number from `history list`
        index: usize,
    },
}

#[derive(Subcommand)]
pub enum ToolCommands {
    /// List tools and their parameters
    List,
    /// Run a tool directly
    Run {
        name: String,
        /// Arguments as a JSON object
        arguments: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Set a configuration value
    Set { key: String, value: String },
    /// Remove a configuration value
    Unset { key: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

fn resolve_config(args: &Args) -> Result<(ResolvedConfig, std::path::PathBuf), Box<dyn Error>> {
    let file_config = Config::load()?;
    let data_dir = data_dir()?;
    let ollama_host = std::env::var("OLLAMA_HOST").ok();
    let resolved = file_config.resolve(
        ConfigOverrides {
            base_url: args.base_url.as_deref(),
            model: args.model.as_deref(),
            ollama_host: ollama_host.as_deref(),
        },
        &data_dir,
    );
    Ok((resolved, data_dir))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    if let Some(Commands::Config { command }) = &args.command {
        return handle_config(command.as_ref());
    }

    let (config, data_dir) = resolve_config(&args)?;
    init_tracing(&config.log_level, args.verbose, &log_file_path(&data_dir));

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            run_chat(ChatSettings {
                config,
                log_file: args.log,
            })
            .await
        }
        Commands::Say { no_stream, prompt } => run_say(prompt, no_stream, config, args.log).await,
        Commands::Models => list_models(&config).await,
        Commands::History { command } => match command.unwrap_or(HistoryCommands::List) {
            HistoryCommands::List => list_history(&config),
            HistoryCommands::Show { index } => show_history(&config, index),
        },
        Commands::Tools { command } => {
            let registry = ToolRegistry::with_default_tools();
            match command.unwrap_or(ToolCommands::List) {
                ToolCommands::List => {
                    list_tools(&registry);
                    Ok(())
                }
                ToolCommands::Run { name, arguments } => {
                    run_tool(&registry, &name, arguments.as_deref()).await
                }
            }
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn handle_config(command: Option<&ConfigCommands>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    match command.unwrap_or(&ConfigCommands::Show) {
        ConfigCommands::Show => {
            config.print_all();
            println!();
            println!("📄 {}", path_display(Config::get_config_path()?));
        }
        ConfigCommands::Set { key, value } => {
            config.set_value(key, value)?;
            let path = config.save()?;
            println!("✅ Set {key} to: {value} ({})", path_display(path));
        }
        ConfigCommands::Unset { key } => {
            config.unset_value(key)?;
            config.save()?;
            println!("✅ Unset {key}");
        }
    }
    Ok(())
}
