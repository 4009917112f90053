//! Chat application module for interactive conversations with a
//! text-completion backend.
//!
//! # Architecture
//!
//! - [`session`]: the session controller that owns the transcript
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing for the REPL
//! - [`render`]: terminal rendering of transcript updates

mod commands;
mod config;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use render::TranscriptRenderer;
pub use session::{ChatSession, CompletionFailure, ListenerId, SessionStats};
