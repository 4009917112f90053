use serde::{Deserialize, Serialize};

use crate::types::Usage;

/// One generated alternative in a [`CompletionResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    /// The generated text, verbatim from the backend.
    pub text: String,

    /// Position of this choice in the response.
    #[serde(default)]
    pub index: u32,

    /// Why generation stopped (`stop`, `length`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl CompletionChoice {
    /// Create a choice holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            index: 0,
            finish_reason: None,
        }
    }
}

/// Body of a successful `POST /completions` response.
///
/// Fields beyond `id` and `choices` are informational; unknown fields are
/// ignored so compatible backends with extra metadata still parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Backend-assigned identifier; empty when the backend omitted it.
    #[serde(default)]
    pub id: String,

    /// Generated alternatives, normally exactly one.
    pub choices: Vec<CompletionChoice>,

    /// Model that served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Unix timestamp at which the backend generated the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    /// Token accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Create a response with the given id and choice texts.
    pub fn new<I, S>(id: impl Into<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| CompletionChoice {
                index: index as u32,
                ..CompletionChoice::new(text)
            })
            .collect();
        Self {
            id: id.into(),
            choices,
            ..Self::default()
        }
    }

    /// Text of the first choice, if there is one.
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.text.as_str())
    }

    /// The backend id, or `None` when it was absent or blank.
    pub fn response_id(&self) -> Option<&str> {
        let id = self.id.trim();
        if id.is_empty() { None } else { Some(id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_openai_payload() {
        let payload = json!({
            "id": "cmpl-7",
            "object": "text_completion",
            "created": 1680000000,
            "model": "gpt-3.5-turbo-instruct",
            "choices": [
                {"text": "\n\nHi there", "index": 0, "logprobs": null, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 1, "completion_tokens": 3, "total_tokens": 4}
        });
        let response: CompletionResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(response.response_id(), Some("cmpl-7"));
        assert_eq!(response.first_text(), Some("\n\nHi there"));
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(4));
    }

    #[test]
    fn missing_id_is_none() {
        let response: CompletionResponse =
            serde_json::from_value(json!({"choices": [{"text": "x"}]})).unwrap();
        assert_eq!(response.id, "");
        assert_eq!(response.response_id(), None);
    }

    #[test]
    fn choices_are_required() {
        assert!(serde_json::from_value::<CompletionResponse>(json!({"id": "x"})).is_err());
    }

    #[test]
    fn empty_choices_have_no_text() {
        let response = CompletionResponse::new("x", Vec::<String>::new());
        assert_eq!(response.first_text(), None);
    }
}
