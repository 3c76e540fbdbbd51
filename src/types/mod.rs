//! Core types used throughout the library.

pub mod message;
pub mod request;
pub mod settings;

// Re-export commonly used types
pub use message::*;
pub use request::*;
pub use settings::*;
