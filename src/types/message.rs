use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Who wrote a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Text typed by the person at the keyboard.
    User,
    /// Text produced by the completion backend.
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a chat transcript.
///
/// Messages are built once through [`Message::user`] or
/// [`Message::assistant`] and never change afterwards; the fields are only
/// reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    content: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    sender: Sender,
}

impl Message {
    /// Create a user message.  The text is stored verbatim.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: fresh_id(),
            content: text.into(),
            created_at: OffsetDateTime::now_utc(),
            sender: Sender::User,
        }
    }

    /// Create an assistant message from a backend reply.
    ///
    /// The id is the backend's when it supplied a non-blank one and a freshly
    /// generated one otherwise.  The text goes through
    /// [`clean_completion_text`].  `created_at` is the time of receipt.
    pub fn assistant(id: Option<&str>, text: &str) -> Self {
        let id = id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .unwrap_or_else(fresh_id);
        Self {
            id,
            content: clean_completion_text(text),
            created_at: OffsetDateTime::now_utc(),
            sender: Sender::Assistant,
        }
    }

    /// The unique identifier of this message.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The message text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// When this message was constructed.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Who wrote this message.
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// True for messages typed by the user.
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// True for messages produced by the backend.
    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }
}

/// Strip the wrapping completion models tend to put around their answers.
///
/// Removes any run of whitespace and `"` characters from both ends.  Quotes
/// inside the text are kept.
pub fn clean_completion_text(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '"')
        .to_string()
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn user_message_is_verbatim() {
        let message = Message::user("  \"keep me\"\n");
        assert_eq!(message.content(), "  \"keep me\"\n");
        assert_eq!(message.sender(), Sender::User);
        assert!(message.is_user());
        assert!(!message.id().is_empty());
    }

    #[test]
    fn assistant_message_strips_quotes_and_whitespace() {
        let message = Message::assistant(Some("x1"), "  \"hello\"\n");
        assert_eq!(message.content(), "hello");
        assert_eq!(message.id(), "x1");
        assert!(message.is_assistant());
    }

    #[test]
    fn clean_keeps_inner_quotes() {
        assert_eq!(clean_completion_text("\n\"say \"hi\" now\""), "say \"hi\" now");
        assert_eq!(clean_completion_text(" \" \" "), "");
        assert_eq!(clean_completion_text("plain"), "plain");
    }

    #[test]
    fn assistant_without_id_gets_fresh_one() {
        let missing = Message::assistant(None, "a");
        let blank = Message::assistant(Some("  "), "b");
        assert!(!missing.id().is_empty());
        assert!(!blank.id().trim().is_empty());
        assert_ne!(missing.id(), blank.id());
    }

    #[test]
    fn user_ids_are_distinct() {
        let ids: HashSet<String> = (0..100)
            .map(|_| Message::user("same").id().to_string())
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn serializes_with_rfc3339_timestamp() {
        let message = Message::assistant(Some("cmpl-1"), "Hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["id"], "cmpl-1");
        assert_eq!(json["sender"], "assistant");
        assert!(json["created_at"].as_str().unwrap().contains('T'));

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }
}
