//! Provider adapters for the supported streaming backends.

pub mod gemini;
pub mod openai;

// Re-export commonly used provider types
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
