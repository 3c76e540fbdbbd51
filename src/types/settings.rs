use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::providers::{gemini, openai};

/// User-tunable assistant configuration. Owned by the presentation layer and
/// persisted through a settings store; the streaming core only reads it.
///
/// Every field carries a serde default so a partially written or older stored
/// value still deserializes instead of being discarded wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub active_provider: String,
    pub send_context: bool,
    pub providers: BTreeMap<String, ProviderSettings>,
}

/// Per-provider credentials and model selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            openai::PROVIDER_ID.to_string(),
            ProviderSettings {
                api_key: String::new(),
                model_id: openai::DEFAULT_MODEL.to_string(),
            },
        );
        providers.insert(
            gemini::PROVIDER_ID.to_string(),
            ProviderSettings {
                api_key: String::new(),
                model_id: gemini::DEFAULT_MODEL.to_string(),
            },
        );
        Settings {
            active_provider: openai::PROVIDER_ID.to_string(),
            send_context: true,
            providers,
        }
    }
}

impl Settings {
    /// Stored configuration for one provider, if any.
    pub fn provider(&self, id: &str) -> Option<&ProviderSettings> {
        self.providers.get(id)
    }

    /// Mutable configuration for one provider, created empty when absent.
    pub fn provider_mut(&mut self, id: &str) -> &mut ProviderSettings {
        self.providers.entry(id.to_string()).or_default()
    }
}
