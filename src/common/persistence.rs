//! Durable local storage for the notification settings.
//!
//! Settings live under a single key (one JSON file). Reads never fail: a
//! missing or unreadable file is reported as absent and the caller falls back
//! to defaults. Writes are synchronous.

use crate::error::OrchestratorError;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

/// Get the path to the persisted notification settings
pub fn get_settings_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("claude-dash").join("notification-settings.json"))
}

/// Single-key durable storage
pub trait SettingsStorage {
    /// Raw persisted value, if any
    fn load(&self) -> Option<String>;

    /// Replace the persisted value
    fn save(&self, contents: &str) -> Result<(), OrchestratorError>;
}

/// File-backed storage
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsStorage for FileStorage {
    fn load(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    fn save(&self, contents: &str) -> Result<(), OrchestratorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Atomic replace: readers see the old file or the new one
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory storage, for previews and tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    value: RefCell<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        Self {
            value: RefCell::new(Some(value.to_string())),
        }
    }
}

impl SettingsStorage for MemoryStorage {
    fn load(&self) -> Option<String> {
        self.value.borrow().clone()
    }

    fn save(&self, contents: &str) -> Result<(), OrchestratorError> {
        *self.value.borrow_mut() = Some(contents.to_string());
        Ok(())
    }
}
