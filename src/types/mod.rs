// Public modules
pub mod completion_request;
pub mod completion_response;
pub mod message;
pub mod model;
pub mod usage;

// Re-exports
pub use completion_request::CompletionRequest;
pub use completion_response::{CompletionChoice, CompletionResponse};
pub use message::{Message, Sender, clean_completion_text};
pub use model::{KnownModel, Model};
pub use usage::Usage;
