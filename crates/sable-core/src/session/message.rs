//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles and message content.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

impl MessageRole {
    /// Returns the role label used when rendering history into a prompt.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

/// A single message in a conversation history.
///
/// Each message has a role (user or assistant), content, a timestamp
/// indicating when it was created, and a cheap token estimate used for
/// context accounting. Messages are immutable once appended; the only
/// bulk mutation is the prefix replace performed by history compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format).
    pub timestamp: String,
    /// Rough token count: content length / 4. A cheap proxy, not a real
    /// tokenizer.
    pub token_estimate: usize,
}

impl ConversationMessage {
    /// Creates a new message stamped with the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_estimate = estimate_tokens(&content);
        Self {
            role,
            content,
            timestamp: chrono::Utc::now().to_rfc3339(),
            token_estimate,
        }
    }

    /// Renders the message as a `Role: content` line for prompt building
    /// and compression input.
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.as_str(), self.content)
    }
}

/// Estimates the token count of a text as `len / 4`.
///
/// The external tool does not expose its tokenizer, so the whole layer
/// uses this proxy consistently for budgeting and usage reporting.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_token_estimate() {
        let msg = ConversationMessage::new(MessageRole::User, "12345678");
        assert_eq!(msg.token_estimate, 2);
    }

    #[test]
    fn test_message_render() {
        let msg = ConversationMessage::new(MessageRole::Assistant, "hello");
        assert_eq!(msg.render(), "Assistant: hello");
    }

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }
}
