//! Message model — chat messages and the ordered message log.
//!
//! DESIGN
//! ======
//! A conversation is a flat `Vec<Message>`. Requests and replies are paired
//! by adjacency: a user message is followed by at most one assistant message
//! answering it. The log only grows at the tail; the single exception is
//! `pop_trailing_assistant`, which `retry` uses to drop a failed reply.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

// =============================================================================
// MESSAGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status of a message. User messages are always `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Streaming,
    Complete,
    Error,
}

impl MessageStatus {
    /// `true` once the content of a message can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// A single chat message. Mirrors the persisted history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: MessageStatus,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            status: MessageStatus::Complete,
        }
    }

    /// Empty assistant message awaiting a reply.
    #[must_use]
    pub fn assistant_placeholder(status: MessageStatus) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: OffsetDateTime::now_utc(),
            status,
        }
    }
}

/// Generate a fresh opaque message identifier.
#[must_use]
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// MESSAGE LOG
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from previously persisted messages. A reveal cannot survive
    /// a restart, so leftover `Streaming` entries are marked `Complete`.
    #[must_use]
    pub fn restore(messages: Vec<Message>) -> Self {
        let mut log = Self { messages };
        log.complete_streaming();
        log
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Apply `f` to the message with `id`. Returns `false` if it is gone.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut Message)) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                f(message);
                true
            }
            None => false,
        }
    }

    /// Most recent user message, scanning from the end.
    #[must_use]
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Remove the last message if it is an assistant reply.
    pub fn pop_trailing_assistant(&mut self) -> Option<Message> {
        if self.messages.last().is_some_and(|m| m.role == Role::Assistant) { self.messages.pop() } else { None }
    }

    /// Force every `Streaming` message to `Complete`, keeping its content.
    /// Returns how many messages changed.
    pub fn complete_streaming(&mut self) -> usize {
        let mut changed = 0;
        for message in &mut self.messages {
            if message.status == MessageStatus::Streaming {
                message.status = MessageStatus::Complete;
                changed += 1;
            }
        }
        changed
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Serialize history for the durable store.
///
/// # Errors
///
/// Returns the serde error if a message cannot be encoded.
pub fn encode_history(messages: &[Message]) -> Result<String, serde_json::Error> {
    serde_json::to_string(messages)
}

/// Parse persisted history, normalizing interrupted reveals.
///
/// # Errors
///
/// Returns the serde error if the payload is not a valid message array.
pub fn decode_history(json: &str) -> Result<MessageLog, serde_json::Error> {
    let messages: Vec<Message> = serde_json::from_str(json)?;
    Ok(MessageLog::restore(messages))
}
