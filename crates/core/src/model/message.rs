use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved user-message text that seeds a session with its opening
/// assistant question. Sent exactly once per session and stripped from
/// every externally visible transcript.
pub const SEED_SENTINEL: &str = "__AUTO_SURGE_START__";

/// Upper bound on a single message, matching the platform's input cap.
pub const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageError {
    #[error("message text is empty")]
    Empty,

    #[error("message text is too long: {len} > {MAX_MESSAGE_LEN}")]
    TooLong { len: usize },
}

/// Author of a message within a reflective dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry in a session transcript. Insertion order is semantic: the
/// ordered sequence of messages *is* the reflective dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: MessageRole,
    text: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Builds a validated user message.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::Empty` for whitespace-only text and
    /// `MessageError::TooLong` above `MAX_MESSAGE_LEN` characters.
    pub fn user(text: impl Into<String>, at: DateTime<Utc>) -> Result<Self, MessageError> {
        Self::validated(MessageRole::User, text.into(), at)
    }

    /// Builds a validated assistant message.
    ///
    /// # Errors
    ///
    /// Same validation rules as [`Message::user`].
    pub fn assistant(text: impl Into<String>, at: DateTime<Utc>) -> Result<Self, MessageError> {
        Self::validated(MessageRole::Assistant, text.into(), at)
    }

    /// Builds the hidden seed message that elicits the first assistant question.
    #[must_use]
    pub fn seed(at: DateTime<Utc>) -> Self {
        Self {
            role: MessageRole::User,
            text: SEED_SENTINEL.to_string(),
            timestamp: at,
        }
    }

    fn validated(
        role: MessageRole,
        text: String,
        at: DateTime<Utc>,
    ) -> Result<Self, MessageError> {
        if text.trim().is_empty() {
            return Err(MessageError::Empty);
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(MessageError::TooLong { len });
        }
        Ok(Self {
            role,
            text,
            timestamp: at,
        })
    }

    #[must_use]
    pub fn role(&self) -> MessageRole {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True for the hidden seed message.
    #[must_use]
    pub fn is_seed(&self) -> bool {
        self.role == MessageRole::User && self.text == SEED_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rejects_empty_text() {
        let err = Message::user("   ", fixed_now()).unwrap_err();
        assert_eq!(err, MessageError::Empty);
    }

    #[test]
    fn rejects_oversized_text() {
        let text = "x".repeat(MAX_MESSAGE_LEN + 1);
        let err = Message::user(text, fixed_now()).unwrap_err();
        assert!(matches!(err, MessageError::TooLong { .. }));
    }

    #[test]
    fn seed_is_recognized() {
        let seed = Message::seed(fixed_now());
        assert!(seed.is_seed());
        assert_eq!(seed.role(), MessageRole::User);
    }

    #[test]
    fn assistant_echo_of_sentinel_is_not_a_seed() {
        let msg = Message::assistant(SEED_SENTINEL, fixed_now()).unwrap();
        assert!(!msg.is_seed());
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::user("hello", fixed_now()).unwrap();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "hello");
    }
}
