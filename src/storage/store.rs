// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

/// Error types for persistent store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A durable key-value store partitioned by namespace.
///
/// Calls may block; the storage facade only invokes them from the blocking pool.
pub trait PersistentStore: Send + Sync {
    /// Reads every entry in a namespace.
    fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Inserts or replaces one entry.
    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes one entry. Removing an absent key is not an error.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;

    /// Removes every entry in a namespace.
    fn clear(&self, namespace: &str) -> Result<(), StoreError>;
}

/// A store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one entry directly.
    pub fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.namespaces
            .lock()
            .get(namespace)
            .and_then(|entries| entries.get(key).cloned())
    }
}

impl PersistentStore for MemoryStore {
    fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .namespaces
            .lock()
            .get(namespace)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.namespaces
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        if let Some(entries) = self.namespaces.lock().get_mut(namespace) {
            entries.remove(key);
        }
        Ok(())
    }

    fn clear(&self, namespace: &str) -> Result<(), StoreError> {
        self.namespaces.lock().remove(namespace);
        Ok(())
    }
}
