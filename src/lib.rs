//! Streaming documentation assistant over multiple LLM providers.
//!
//! This library drives a chat session against OpenAI-style and Gemini-style
//! streaming APIs: it frames server-sent events, extracts text increments
//! per provider, and applies them to a transcript through a session
//! controller with cooperative cancellation. Page context extracted from
//! markdown rides along as a system prompt.

pub mod context;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod session;
pub mod settings_store;
pub mod sse_stream;
pub mod types;

// Re-export core types for easy usage
pub use context::{DocContext, DocMeta};
pub use error::{Error, ErrorCategory, SurfacedError};
pub use provider::{ProviderAdapter, ProviderDescriptor, TextStream};
pub use providers::*;
pub use registry::ProviderRegistry;
pub use session::AssistantSession;
pub use settings_store::{FileSettingsStore, MemorySettingsStore, SettingsStore};
pub use sse_stream::SseStreamExt;
pub use types::*;
