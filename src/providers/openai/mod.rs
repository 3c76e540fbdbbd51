pub mod client;
pub mod types;

pub use client::{OpenAIProvider, DEFAULT_MODEL, PROVIDER_ID};
