use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in the conversation transcript.
///
/// The session controller creates these: a user message when a send is
/// accepted, immediately followed by an assistant message with empty content
/// that streaming increments append to. Individual messages are never removed;
/// the whole transcript is cleared by `reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub provider_id: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with role and text content.
    pub fn new(role: Role, content: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            provider_id: provider_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Message::new(Role::System, content, provider_id)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Message::new(Role::User, content, provider_id)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Message::new(Role::Assistant, content, provider_id)
    }
}

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}
