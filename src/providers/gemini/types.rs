use serde::{Deserialize, Serialize};

/// Generative Language API streaming request.
#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction")]
    pub system_instruction: GeminiContent,
    #[serde(rename = "generationConfig")]
    pub generation_config: GeminiGenerationConfig,
}

/// Gemini content (message) format. Role is "user" or "model"; "system"
/// appears only inside the systemInstruction field.
#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// Part of a Gemini content.
#[derive(Debug, Clone, Serialize)]
pub struct GeminiPart {
    pub text: String,
}

/// Gemini generation configuration.
#[derive(Debug, Clone, Serialize)]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
}

/// A streamed payload document: the endpoint emits either one chunk object
/// or an array of them depending on the response variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeminiPayload {
    Many(Vec<GeminiChunk>),
    One(GeminiChunk),
}

/// One streamed response chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiChunk {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

/// Candidate entry inside a chunk. Depending on the variant, text lives
/// under `content` or under `delta`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiChunkContent>,
    #[serde(default)]
    pub delta: Option<GeminiDelta>,
}

/// Content node carrying text parts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiChunkContent {
    #[serde(default)]
    pub parts: Vec<GeminiChunkPart>,
}

/// One text part of a content node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiChunkPart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Incremental delta variant of a candidate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiDelta {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<GeminiChunkContent>,
}
