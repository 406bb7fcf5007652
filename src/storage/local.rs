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
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::sqlite::SqliteStore;
use super::store::{PersistentStore, StoreError};

/// A write queued for the persistent store.
enum WriteOp {
    Put { key: String, value: String },
    Delete { key: String },
    Clear,
    /// Completes once every op queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

impl WriteOp {
    fn apply(&self, store: &dyn PersistentStore, namespace: &str) -> Result<(), StoreError> {
        match self {
            WriteOp::Put { key, value } => store.put(namespace, key, value),
            WriteOp::Delete { key } => store.delete(namespace, key),
            WriteOp::Clear => store.clear(namespace),
            WriteOp::Flush(_) => Ok(()),
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Put { key, .. } => write!(f, "put {}", key),
            WriteOp::Delete { key } => write!(f, "delete {}", key),
            WriteOp::Clear => write!(f, "clear"),
            WriteOp::Flush(_) => write!(f, "flush"),
        }
    }
}

/// A synchronous key-value store for one namespace.
///
/// Reads and writes are served by an in-memory map that was hydrated from the
/// persistent store when it was opened. Writes are then passed to the
/// persistent store in the background, in order. A failed background write is
/// logged and dropped, so the persistent copy may lag the in-memory one until
/// [`LocalStorage::flush`] completes.
#[derive(Clone)]
pub struct LocalStorage {
    namespace: String,
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    writer: Option<mpsc::UnboundedSender<WriteOp>>,
}

impl LocalStorage {
    /// Creates a storage that is never persisted.
    pub fn memory_only(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            writer: None,
        }
    }

    /// Opens a namespace of the given store. Resolves once every persisted
    /// entry is in memory. If there is no store, or it cannot be read, the
    /// storage continues in memory only.
    pub async fn open(
        namespace: impl Into<String>,
        store: Option<Arc<dyn PersistentStore>>,
    ) -> Self {
        let namespace = namespace.into();
        let Some(store) = store else {
            info!(namespace = %namespace, "No persistent store configured, storage is memory only");
            return Self::memory_only(namespace);
        };

        let hydrate_store = store.clone();
        let hydrate_namespace = namespace.clone();
        let loaded =
            tokio::task::spawn_blocking(move || hydrate_store.load_all(&hydrate_namespace))
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))
                .and_then(|result| result);

        match loaded {
            Ok(entries) => {
                info!(namespace = %namespace, entries = entries.len(), "Storage hydrated");
                let (sender, receiver) = mpsc::unbounded_channel();
                tokio::spawn(write_through(namespace.clone(), store, receiver));
                Self {
                    namespace,
                    entries: Arc::new(RwLock::new(entries.into_iter().collect())),
                    writer: Some(sender),
                }
            }
            Err(e) => {
                warn!(
                    namespace = %namespace,
                    err = %e,
                    "Failed to hydrate storage, continuing in memory only"
                );
                Self::memory_only(namespace)
            }
        }
    }

    /// Opens a namespace of the SQLite database at `path`, falling back to
    /// memory only if the database cannot be opened.
    pub async fn open_sqlite(path: &Path, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let db_path = path.to_path_buf();
        let opened = tokio::task::spawn_blocking(move || SqliteStore::open(&db_path))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
            .and_then(|result| result);

        match opened {
            Ok(store) => Self::open(namespace, Some(Arc::new(store))).await,
            Err(e) => {
                warn!(
                    path = ?path,
                    err = %e,
                    "Failed to open storage database, continuing in memory only"
                );
                Self::memory_only(namespace)
            }
        }
    }

    /// Opens the storage described by the configuration.
    pub async fn from_config(config: &crate::config::Storage) -> Self {
        match config.path() {
            Some(path) => Self::open_sqlite(path, config.namespace()).await,
            None => Self::open(config.namespace(), None).await,
        }
    }

    /// Gets the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether writes are passed on to a persistent store.
    pub fn is_persistent(&self) -> bool {
        self.writer.is_some()
    }

    /// Gets the value stored under `key`.
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` under `key`.
    pub fn set_item(&self, key: &str, value: &str) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.enqueue(WriteOp::Put {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Removes `key`, if present.
    pub fn remove_item(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.enqueue(WriteOp::Delete {
                key: key.to_string(),
            });
        }
    }

    /// Removes every key in the namespace.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.enqueue(WriteOp::Clear);
    }

    /// Gets the key at `index` in key order.
    pub fn key(&self, index: usize) -> Option<String> {
        self.entries.read().keys().nth(index).cloned()
    }

    /// Gets the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Waits until every write issued so far has reached the persistent store.
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if writer.send(WriteOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Callers hold the entries lock so the queue order matches the map.
    fn enqueue(&self, op: WriteOp) {
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.send(op) {
                warn!(namespace = %self.namespace, op = %e.0, "Storage writer has stopped");
            }
        }
    }
}

impl fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorage")
            .field("namespace", &self.namespace)
            .field("entries", &self.len())
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

/// Applies queued writes to the store one at a time until every sender is gone.
async fn write_through(
    namespace: String,
    store: Arc<dyn PersistentStore>,
    mut ops: mpsc::UnboundedReceiver<WriteOp>,
) {
    while let Some(op) = ops.recv().await {
        if let WriteOp::Flush(done) = op {
            let _ = done.send(());
            continue;
        }

        let op_store = store.clone();
        let op_namespace = namespace.clone();
        let description = op.to_string();
        match tokio::task::spawn_blocking(move || op.apply(op_store.as_ref(), &op_namespace)).await
        {
            Ok(Ok(())) => debug!(namespace = %namespace, op = %description, "Storage write applied"),
            Ok(Err(e)) => warn!(
                namespace = %namespace,
                op = %description,
                err = %e,
                "Storage write failed, keeping the in-memory value"
            ),
            Err(e) => warn!(
                namespace = %namespace,
                op = %description,
                err = %e,
                "Storage write task failed"
            ),
        }
    }
    debug!(namespace = %namespace, "Storage writer stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tracing::Level;

    use super::super::store::MemoryStore;
    use super::*;
    use crate::testutil::{count_events, eventually_async};

    #[derive(PartialEq)]
    enum Failure {
        Reads,
        Writes,
    }

    /// A store whose reads or writes always fail.
    struct FailingStore {
        failure: Failure,
        inner: MemoryStore,
    }

    impl FailingStore {
        fn check_write(&self) -> Result<(), StoreError> {
            match self.failure {
                Failure::Writes => Err(StoreError::Unavailable("disk full".to_string())),
                Failure::Reads => Ok(()),
            }
        }
    }

    impl PersistentStore for FailingStore {
        fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError> {
            if self.failure == Failure::Reads {
                return Err(StoreError::Unavailable("corrupt".to_string()));
            }
            self.inner.load_all(namespace)
        }

        fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
            self.check_write()?;
            self.inner.put(namespace, key, value)
        }

        fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
            self.check_write()?;
            self.inner.delete(namespace, key)
        }

        fn clear(&self, namespace: &str) -> Result<(), StoreError> {
            self.check_write()?;
            self.inner.clear(namespace)
        }
    }

    #[tokio::test]
    async fn test_set_then_get_is_immediate() {
        let store = Arc::new(MemoryStore::new());
        let storage = LocalStorage::open("tab-1", Some(store.clone())).await;
        assert!(storage.is_persistent());

        storage.set_item("k", "v");
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        // The writer has not had a chance to run yet.
        assert_eq!(store.get("tab-1", "k"), None);

        storage.flush().await;
        assert_eq!(store.get("tab-1", "k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_writes_reach_store_without_flush() {
        let store = Arc::new(MemoryStore::new());
        let storage = LocalStorage::open("tab-1", Some(store.clone())).await;

        storage.set_item("k", "v");
        eventually_async(
            || {
                let store = store.clone();
                async move { store.get("tab-1", "k").is_some() }
            },
            "Write never reached the store",
        )
        .await;
    }

    #[tokio::test]
    async fn test_absent_key() {
        let storage = LocalStorage::memory_only("tab-1");
        assert_eq!(storage.get_item("nope"), None);
        assert_eq!(storage.key(0), None);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let store = Arc::new(MemoryStore::new());

        let storage = LocalStorage::open("tab-1", Some(store.clone())).await;
        storage.set_item("song", "intro");
        storage.set_item("bpm", "120");
        storage.set_item("song", "verse");
        storage.set_item("gone", "soon");
        storage.remove_item("gone");
        storage.flush().await;
        drop(storage);

        let reloaded = LocalStorage::open("tab-1", Some(store.clone())).await;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get_item("song").as_deref(), Some("verse"));
        assert_eq!(reloaded.get_item("bpm").as_deref(), Some("120"));
        assert_eq!(reloaded.get_item("gone"), None);

        reloaded.clear();
        reloaded.flush().await;
        let cleared = LocalStorage::open("tab-1", Some(store)).await;
        assert!(cleared.is_empty());
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let store: Arc<dyn PersistentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());

        let first = LocalStorage::open("tab-1", Some(store.clone())).await;
        let second = LocalStorage::open("tab-2", Some(store.clone())).await;
        first.set_item("song", "a");
        second.set_item("song", "b");
        first.clear();
        first.flush().await;
        second.flush().await;

        let first = LocalStorage::open("tab-1", Some(store.clone())).await;
        let second = LocalStorage::open("tab-2", Some(store)).await;
        assert_eq!(first.get_item("song"), None);
        assert_eq!(second.get_item("song").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_sqlite_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.sqlite");

        let storage = LocalStorage::open_sqlite(&path, "tab-1").await;
        assert!(storage.is_persistent());
        storage.set_item("pattern", "00 01 02");
        storage.flush().await;
        drop(storage);

        let reloaded = LocalStorage::open_sqlite(&path, "tab-1").await;
        assert_eq!(reloaded.get_item("pattern").as_deref(), Some("00 01 02"));
    }

    #[tokio::test]
    async fn test_open_failure_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("storage.sqlite");

        let storage = LocalStorage::open_sqlite(&path, "tab-1").await;
        assert!(!storage.is_persistent());

        storage.set_item("k", "v");
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        assert_eq!(storage.key(0).as_deref(), Some("k"));
        storage.remove_item("k");
        assert_eq!(storage.get_item("k"), None);
        storage.set_item("a", "1");
        storage.clear();
        assert!(storage.is_empty());
        storage.flush().await;
    }

    #[tokio::test]
    async fn test_hydrate_failure_falls_back_to_memory() {
        let (subscriber, warnings) = count_events(Level::WARN);
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = Arc::new(FailingStore {
            failure: Failure::Reads,
            inner: MemoryStore::new(),
        });
        let storage = LocalStorage::open("tab-1", Some(store)).await;

        assert!(!storage.is_persistent());
        storage.set_item("k", "v");
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_write_is_absorbed() {
        let (subscriber, warnings) = count_events(Level::WARN);
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = Arc::new(FailingStore {
            failure: Failure::Writes,
            inner: MemoryStore::new(),
        });
        let storage = LocalStorage::open("tab-1", Some(store.clone())).await;

        storage.set_item("k", "v");
        storage.flush().await;

        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        assert_eq!(store.inner.get("tab-1", "k"), None);
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_key_order_and_len() {
        let storage = LocalStorage::memory_only("tab-1");
        storage.set_item("b", "2");
        storage.set_item("a", "1");
        storage.set_item("c", "3");

        assert_eq!(storage.len(), 3);
        assert_eq!(storage.key(0).as_deref(), Some("a"));
        assert_eq!(storage.key(2).as_deref(), Some("c"));
        assert_eq!(storage.key(3), None);
    }

    #[tokio::test]
    async fn test_from_config() {
        let storage =
            LocalStorage::from_config(&crate::config::Storage::new(None, "tab-9")).await;
        assert_eq!(storage.namespace(), "tab-9");
        assert!(!storage.is_persistent());
    }
}
