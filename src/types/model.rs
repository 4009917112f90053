use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A text-completion model identifier.
///
/// This can be one of the models known to serve the completions endpoint or
/// a custom string for fine-tunes and self-hosted backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier (fine-tunes, compatible servers)
    Custom(String),
}

/// Models known to serve the legacy completions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// GPT-3.5 Turbo, instruction-tuned for the completions endpoint.
    #[serde(rename = "gpt-3.5-turbo-instruct")]
    Gpt35TurboInstruct,

    /// Davinci base model.
    #[serde(rename = "davinci-002")]
    Davinci002,

    /// Babbage base model.
    #[serde(rename = "babbage-002")]
    Babbage002,

    /// Text Davinci 003 (retired upstream, still served by some compatible backends).
    #[serde(rename = "text-davinci-003")]
    TextDavinci003,
}

impl KnownModel {
    /// Every known model, in display order.
    pub const ALL: [KnownModel; 4] = [
        KnownModel::Gpt35TurboInstruct,
        KnownModel::Davinci002,
        KnownModel::Babbage002,
        KnownModel::TextDavinci003,
    ];

    /// The identifier sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::Gpt35TurboInstruct => "gpt-3.5-turbo-instruct",
            KnownModel::Davinci002 => "davinci-002",
            KnownModel::Babbage002 => "babbage-002",
            KnownModel::TextDavinci003 => "text-davinci-003",
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::Gpt35TurboInstruct)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{}", known_model),
            Model::Custom(custom) => write!(f, "{}", custom),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation(
                "model name cannot be empty",
                Some("model".to_string()),
            ));
        }
        Ok(KnownModel::ALL
            .iter()
            .find(|known| known.as_str() == s)
            .map(|known| Model::Known(*known))
            .unwrap_or_else(|| Model::Custom(s.to_string())))
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        Model::Custom(model)
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model::Custom(model.to_string())
    }
}
