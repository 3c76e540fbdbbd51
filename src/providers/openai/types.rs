use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Chat Completions streaming request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<ChatRequestMessage>,
}

/// One entry of the outbound `messages` array. `Role` already serializes to
/// the lowercase strings this API expects.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequestMessage {
    pub role: Role,
    pub content: String,
}

/// One Chat Completions streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChatChunkChoice>,
}

/// Choice entry inside a streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunkChoice {
    #[serde(default)]
    pub delta: ChatChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message delta inside a choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}
