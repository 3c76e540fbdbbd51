use std::pin::Pin;

use futures_util::Stream;

use crate::types::{Settings, StreamRequest};
use crate::Error;

/// Lazy sequence of assistant text increments, in transport arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Static presentation metadata for one provider. No behavior lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub default_model: &'static str,
    pub docs_url: Option<&'static str>,
}

/// The capability contract every provider adapter implements.
///
/// Adapters own model/key resolution, request construction, and the
/// event-to-increment extraction for their wire format. They never touch the
/// transcript; the session controller consumes the increment stream and
/// applies it.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Presentation metadata for this provider.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Identifier shorthand used in logs and message metadata.
    fn id(&self) -> &'static str {
        self.descriptor().id
    }

    /// The configured model id, or the provider default when blank.
    fn resolve_model(&self, settings: &Settings) -> String;

    /// The configured API key, trimmed; an empty key counts as absent.
    fn resolve_api_key(&self, settings: &Settings) -> Option<String>;

    /// Cheap structural key check for UX hints. Never consulted when
    /// deciding whether to issue a request.
    fn validate_key_shape(&self, key: &str) -> bool;

    /// Open the streaming request and return the increment sequence.
    ///
    /// Fails fast with [`Error::MissingKey`] before any network call when no
    /// key is configured. A malformed event inside the stream is skipped, not
    /// surfaced; only transport-level failures end the stream with an error.
    async fn stream(&self, request: &StreamRequest) -> Result<TextStream, Error>;
}
