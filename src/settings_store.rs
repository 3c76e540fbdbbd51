//! Durable storage for assistant settings.
//!
//! Loading never fails outward: a missing, unreadable, or corrupt document
//! falls back to [`Settings::default`] with a diagnostic, so the session can
//! always start.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::types::Settings;

/// Key the settings document is stored under.
pub const STORE_KEY: &str = "assistant-settings";

const APP_DIR: &str = "doc-assistant";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access settings store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Where session settings are loaded from and saved to.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// TOML document under the platform config directory
/// (`<config_dir>/doc-assistant/assistant-settings.toml`).
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(format!("{STORE_KEY}.toml"));
        Self { path }
    }

    /// Store backed by an explicit file path.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Settings::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "settings unreadable, using defaults");
                return Settings::default();
            }
        };

        match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "settings corrupt, using defaults");
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(settings)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedders that handle persistence
/// themselves.
#[derive(Default)]
pub struct MemorySettingsStore {
    slot: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            slot: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Settings {
        self.slot
            .lock()
            .expect("settings mutex poisoned")
            .clone()
            .unwrap_or_default()
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        *self.slot.lock().expect("settings mutex poisoned") = Some(settings.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().expect("settings mutex poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileSettingsStore {
        FileSettingsStore::at(dir.path().join(format!("{STORE_KEY}.toml")))
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let settings = store.load();
        assert_eq!(settings.active_provider, "openai");
        assert!(settings.send_context);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut settings = Settings::default();
        settings.active_provider = "gemini".to_string();
        settings.provider_mut("gemini").api_key = "k".repeat(24);
        store.save(&settings).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.active_provider, "gemini");
        assert_eq!(loaded.provider("gemini").unwrap().api_key, "k".repeat(24));
    }

    #[test]
    fn corrupt_document_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "not = [valid toml").unwrap();

        let settings = store.load();
        assert_eq!(settings.active_provider, "openai");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::at(dir.path().join("nested").join("deeper").join("s.toml"));
        store.save(&Settings::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn clear_removes_the_document_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&Settings::default()).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.load().active_provider, "openai");

        let mut settings = Settings::default();
        settings.send_context = false;
        store.save(&settings).unwrap();
        assert!(!store.load().send_context);

        store.clear().unwrap();
        assert!(store.load().send_context);
    }
}
