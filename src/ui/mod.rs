//! Terminal front end for chat sessions.
//!
//! - [`chat_loop`]: the interactive loop that dispatches user input to
//!   [`crate::commands`] and the orchestrator, and runs background work.
//! - [`renderer`]: turns queued display events into terminal text.
//!
//! Ownership boundary: this layer presents and captures interaction, while
//! [`crate::core`] owns conversation state and backend coordination.

pub mod chat_loop;
pub mod renderer;
