//! ollama-chat is a terminal chat client for a local Ollama server.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation orchestrator, the HTTP client and NDJSON
//!   stream decoding, chat history persistence and configuration.
//! - [`tools`] holds the tool registry the model may call during a turn.
//! - [`ui`] renders display events and runs the interactive loop that feeds
//!   user input and worker results into the orchestrator.
//! - [`commands`] implements slash-command parsing for the chat loop.
//! - [`api`] defines the request and response payloads of the Ollama API.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod logging;
pub mod tools;
pub mod ui;
pub mod utils;
