//! Key-value persistence for modal drafts.
//!
//! SYSTEM CONTEXT
//! ==============
//! A handful of form fields (invite recipients, draft message, selected
//! template/role) survive a restart. Keys are scoped per community,
//! values are JSON, and the whole store is one file; entries are cleared
//! on successful submission or context teardown.

#[cfg(test)]
#[path = "drafts_test.rs"]
mod drafts_test;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Build the storage key for one draft field of one community.
#[must_use]
pub fn draft_key(slug: &str, field: &str) -> String {
    format!("commons:{slug}:{field}")
}

/// File-backed JSON key-value store.
#[derive(Clone, Debug, Default)]
pub struct DraftStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Value>,
}

impl DraftStore {
    /// Open a store backed by `path`, loading existing entries. A missing
    /// or unreadable file starts the store empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "discarding unreadable draft store");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path),
            entries,
        }
    }

    /// Store with no backing file; entries live for the process only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load and decode the value under `key`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?;
        serde_json::from_value(value.clone()).map_or_else(|_| None, Some)
    }

    /// Encode and store `value` under `key`.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(encoded) => {
                self.entries.insert(key.to_owned(), encoded);
                self.persist();
            }
            Err(error) => {
                tracing::warn!(%error, key, "draft value not serializable");
            }
        }
    }

    /// Remove the value under `key`, if any.
    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }

    /// Remove every entry scoped to `slug`.
    pub fn clear_community(&mut self, slug: &str) {
        let prefix = format!("commons:{slug}:");
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        if self.entries.len() != before {
            self.persist();
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        match serde_json::to_string_pretty(&self.entries) {
            Ok(raw) => {
                if let Err(error) = std::fs::write(path, raw) {
                    tracing::warn!(%error, path = %path.display(), "draft store write failed");
                }
            }
            Err(error) => {
                tracing::warn!(%error, "draft store not serializable");
            }
        }
    }
}
