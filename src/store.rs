//! Durable key/value persistence for credentials and channel metadata.
//!
//! The store is a flat, section-scoped string map with last-write-wins
//! semantics and no transactions. Each service persists into the section
//! named after its descriptor: `RefreshToken`, `Token`, `ExpireTime`,
//! `ScopeVer`, plus whatever channel fields apply (`Name`, `Id`,
//! `StreamKey`, `StreamServer`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Section-scoped string key/value store.
pub trait SessionStore {
    fn get(&self, section: &str, key: &str) -> Option<String>;
    fn set(&mut self, section: &str, key: &str, value: &str);
    /// Drops a whole section, e.g. on sign-out.
    fn remove_section(&mut self, section: &str);
}

/// Handle shared between the registry and every engine it creates.
pub type SharedSessionStore = Arc<Mutex<dyn SessionStore + Send>>;

/// Wraps a concrete store into the shared handle the registry expects.
pub fn shared<S: SessionStore + Send + 'static>(store: S) -> SharedSessionStore {
    Arc::new(Mutex::new(store))
}

/// Purely in-memory store. Used in tests and by hosts that snapshot the
/// sections into their own configuration system.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sections: HashMap<String, HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_section(&mut self, section: &str) {
        self.sections.remove(section);
    }
}

/// Store persisted as a single JSON document on disk.
///
/// The whole document is rewritten on every `set`; the store is small (a
/// handful of strings per service) and last-write-wins is all we promise.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    sections: HashMap<String, HashMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, loading any existing document. A missing
    /// file starts empty; a corrupt one is replaced on the next write.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let sections = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "session store is not valid JSON, starting empty"
                );
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self { path, sections }
    }

    fn flush(&self) {
        let json = match serde_json::to_string_pretty(&self.sections) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize session store");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to write session store"
            );
        }
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.flush();
    }

    fn remove_section(&mut self, section: &str) {
        if self.sections.remove(section).is_some() {
            self.flush();
        }
    }
}
