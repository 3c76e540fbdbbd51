use thiserror::Error;

/// Errors that can occur while driving an assistant session.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no API key configured for {provider}")]
    MissingKey { provider: String },

    #[error("document context is {length} characters, over the {limit} limit")]
    ContextTooLarge { length: usize, limit: usize },

    #[error("a response is already streaming")]
    Busy,

    #[error("{provider} request failed: HTTP {status}")]
    HttpFailure {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("malformed stream event: {0}")]
    MalformedEvent(String),

    #[error("generation stopped")]
    Cancelled,

    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unrecognized failure: {0}")]
    Unrecognized(String),
}

impl Error {
    pub fn missing_key(provider: impl Into<String>) -> Self {
        Error::MissingKey {
            provider: provider.into(),
        }
    }

    pub fn http_failure(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Error::HttpFailure {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    pub fn malformed_event(message: impl Into<String>) -> Self {
        Error::MalformedEvent(message.into())
    }

    pub fn unrecognized(message: impl Into<String>) -> Self {
        Error::Unrecognized(message.into())
    }

    /// Classify this failure independent of the provider that produced it.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingKey { .. } => ErrorCategory::MissingKey,
            Error::ContextTooLarge { .. } => ErrorCategory::ContextTooLarge,
            Error::Busy => ErrorCategory::Busy,
            Error::HttpFailure { .. } => ErrorCategory::HttpFailure,
            Error::MalformedEvent(_) => ErrorCategory::MalformedEvent,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Transport(_) | Error::Unrecognized(_) => ErrorCategory::Unrecognized,
        }
    }

    /// Presentation text for this failure, worded for the given provider label.
    pub fn user_message(&self, provider_label: &str) -> String {
        match self.category() {
            ErrorCategory::MissingKey => {
                format!("Please enter a valid {provider_label} API key.")
            }
            ErrorCategory::ContextTooLarge => {
                "This page is longer than the current context limit.".to_string()
            }
            ErrorCategory::Busy => {
                "Wait for the current response to finish or stop it first.".to_string()
            }
            ErrorCategory::HttpFailure => {
                format!("{provider_label} request failed. Check your key, model, or try again later.")
            }
            ErrorCategory::Cancelled => "Generation stopped.".to_string(),
            ErrorCategory::MalformedEvent | ErrorCategory::Unrecognized => {
                "Request failed. Please try again.".to_string()
            }
        }
    }
}

/// Provider-agnostic failure category. This is the stable unit to assert
/// against; the rendered message text is presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MissingKey,
    ContextTooLarge,
    Busy,
    HttpFailure,
    MalformedEvent,
    Cancelled,
    Unrecognized,
}

/// The single current error value a session exposes to its presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacedError {
    pub category: ErrorCategory,
    pub message: String,
}

impl SurfacedError {
    pub fn from_error(error: &Error, provider_label: &str) -> Self {
        SurfacedError {
            category: error.category(),
            message: error.user_message(provider_label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The one reqwest failure constructible without touching the network.
    fn transport_failure() -> Error {
        let failure = reqwest::Client::new().get("http://").build().unwrap_err();
        Error::from(failure)
    }

    #[test]
    fn every_variant_maps_to_its_category() {
        assert_eq!(
            Error::missing_key("openai").category(),
            ErrorCategory::MissingKey
        );
        assert_eq!(
            Error::ContextTooLarge {
                length: 9000,
                limit: 8000
            }
            .category(),
            ErrorCategory::ContextTooLarge
        );
        assert_eq!(Error::Busy.category(), ErrorCategory::Busy);
        assert_eq!(
            Error::http_failure("openai", 401, "denied").category(),
            ErrorCategory::HttpFailure
        );
        assert_eq!(
            Error::malformed_event("bad frame").category(),
            ErrorCategory::MalformedEvent
        );
        assert_eq!(Error::Cancelled.category(), ErrorCategory::Cancelled);
        assert_eq!(
            transport_failure().category(),
            ErrorCategory::Unrecognized
        );
        assert_eq!(
            Error::unrecognized("boom").category(),
            ErrorCategory::Unrecognized
        );
    }

    #[test]
    fn user_message_text_is_fixed_per_category() {
        assert_eq!(
            Error::missing_key("openai").user_message("OpenAI"),
            "Please enter a valid OpenAI API key."
        );
        assert_eq!(
            Error::ContextTooLarge {
                length: 9000,
                limit: 8000
            }
            .user_message("OpenAI"),
            "This page is longer than the current context limit."
        );
        assert_eq!(
            Error::Busy.user_message("OpenAI"),
            "Wait for the current response to finish or stop it first."
        );
        assert_eq!(
            Error::http_failure("gemini", 500, "oops").user_message("Google Gemini"),
            "Google Gemini request failed. Check your key, model, or try again later."
        );
        assert_eq!(
            Error::Cancelled.user_message("OpenAI"),
            "Generation stopped."
        );
        assert_eq!(
            Error::malformed_event("bad frame").user_message("OpenAI"),
            "Request failed. Please try again."
        );
        assert_eq!(
            Error::unrecognized("boom").user_message("OpenAI"),
            "Request failed. Please try again."
        );
        assert_eq!(
            transport_failure().user_message("OpenAI"),
            "Request failed. Please try again."
        );
    }

    #[test]
    fn surfaced_error_pairs_category_with_rendered_text() {
        let surfaced = SurfacedError::from_error(&Error::Busy, "OpenAI");
        assert_eq!(surfaced.category, ErrorCategory::Busy);
        assert_eq!(
            surfaced.message,
            "Wait for the current response to finish or stop it first."
        );
    }
}
