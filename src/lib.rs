// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod types;

// Re-exports
pub use chat::{ChatConfig, ChatSession, CompletionFailure};
pub use client::{CompletionClient, OpenAi};
pub use client_logger::ClientLogger;
pub use error::{Error, ErrorKind, Result};
pub use observability::register_biometrics;
pub use types::*;
