//! Catalogue of the available provider adapters.
//!
//! Lookup never fails: an unrecognized id resolves to the first registered
//! adapter, so a stale persisted provider id still yields a usable backend.

use tracing::warn;

use crate::provider::{ProviderAdapter, ProviderDescriptor};
use crate::providers::{GeminiProvider, OpenAIProvider};
use crate::Error;

pub struct ProviderRegistry {
    adapters: Vec<Box<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create a registry with its fallback adapter. The first adapter
    /// registered is the one unrecognized ids resolve to.
    pub fn new(fallback: Box<dyn ProviderAdapter>) -> Self {
        Self {
            adapters: vec![fallback],
        }
    }

    /// The standard catalogue: OpenAI-style first (the fallback), then
    /// Gemini-style.
    pub fn standard() -> Result<Self, Error> {
        let mut registry = Self::new(Box::new(OpenAIProvider::new()?));
        registry.register(Box::new(GeminiProvider::new()?));
        Ok(registry)
    }

    /// Add another adapter. Nothing else has to change for a new backend to
    /// become selectable.
    pub fn register(&mut self, adapter: Box<dyn ProviderAdapter>) {
        self.adapters.push(adapter);
    }

    /// Resolve an adapter by id, falling back to the first registered
    /// adapter when the id is unrecognized.
    pub fn get(&self, id: &str) -> &dyn ProviderAdapter {
        match self
            .adapters
            .iter()
            .find(|adapter| adapter.descriptor().id == id)
        {
            Some(adapter) => adapter.as_ref(),
            None => {
                let fallback = self.adapters[0].as_ref();
                warn!(
                    requested = id,
                    fallback = fallback.descriptor().id,
                    "unrecognized provider id"
                );
                fallback
            }
        }
    }

    /// Descriptors of every registered adapter, in registration order.
    pub fn descriptors(&self) -> Vec<&ProviderDescriptor> {
        self.adapters
            .iter()
            .map(|adapter| adapter.descriptor())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{gemini, openai};

    #[test]
    fn standard_catalogue_lists_both_providers() {
        let registry = ProviderRegistry::standard().unwrap();
        let ids: Vec<&str> = registry.descriptors().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![openai::PROVIDER_ID, gemini::PROVIDER_ID]);
    }

    #[test]
    fn lookup_finds_registered_adapters() {
        let registry = ProviderRegistry::standard().unwrap();
        assert_eq!(registry.get(gemini::PROVIDER_ID).id(), gemini::PROVIDER_ID);
        assert_eq!(registry.get(openai::PROVIDER_ID).id(), openai::PROVIDER_ID);
    }

    #[test]
    fn unrecognized_id_falls_back_to_first_adapter() {
        let registry = ProviderRegistry::standard().unwrap();
        assert_eq!(registry.get("no-such-provider").id(), openai::PROVIDER_ID);
        assert_eq!(registry.get("").id(), openai::PROVIDER_ID);
    }
}
