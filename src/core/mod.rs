pub mod app;
pub mod chat_stream;
pub mod client;
pub mod config;
pub mod history;
pub mod message;
