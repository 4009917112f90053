use serde::{Deserialize, Serialize};

use crate::types::Model;

/// Body of a `POST /completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// The model that should complete the prompt.
    pub model: Model,

    /// The raw user text.  Sent as-is, even when empty.
    pub prompt: String,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,

    /// Sampling temperature; the backend default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a request for `prompt` with no temperature override.
    pub fn new(model: Model, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            max_tokens,
            temperature: None,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}
