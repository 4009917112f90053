//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! [`ChatConfig`] that a session and its backend client are built from.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::OpenAi;
use crate::error::Result;
use crate::types::Model;

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 256;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line arguments for the chatterpi tool.
#[derive(CommandLine, Debug, Default, PartialEq)]
pub struct ChatArgs {
    /// Model to use for completions.
    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo-instruct)", "MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 256)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-2.0 (default: backend default)", "TEMP")]
    pub temperature: Option<f32>,

    /// Root URL of a compatible completions backend.
    #[arrrg(optional, "Backend root URL (default: https://api.openai.com/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

// `arrrg::CommandLine` requires `Eq`; `Option<f32>` prevents deriving it.
impl Eq for ChatArgs {}

/// Configuration for a chat session.
///
/// The API key is deliberately absent: it is read from the environment when
/// the client is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: Model,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Root URL of the backend; `None` means the public API.
    pub base_url: Option<String>,

    /// How long a single request may take.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-3.5-turbo-instruct
    /// - Max tokens: 256
    /// - Timeout: 60 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: Model::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Points the client at a different backend.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Builds the HTTP client this configuration describes.
    ///
    /// `api_key` falls back to the OPENAI_API_KEY environment variable.
    pub fn build_client(&self, api_key: Option<String>) -> Result<OpenAi> {
        Ok(
            OpenAi::with_options(api_key, self.base_url.clone(), Some(self.timeout))?
                .with_model(self.model.clone())
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature),
        )
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let model = args
            .model
            .and_then(|s| s.parse::<Model>().ok())
            .unwrap_or_default();

        ChatConfig {
            model,
            max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: args.temperature,
            base_url: args.base_url,
            timeout: args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            use_color: !args.no_color,
        }
    }
}
