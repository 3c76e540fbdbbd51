pub mod client;
pub mod types;

pub use client::{GeminiProvider, DEFAULT_MODEL, PROVIDER_ID};
