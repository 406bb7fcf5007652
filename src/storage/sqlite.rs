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
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::debug;

use super::store::{PersistentStore, StoreError};

/// A persistent store kept in a single SQLite database. Every namespace shares
/// one table, so several host instances can share one file.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        debug!(path = ?path, "Opening storage database");
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Self, StoreError> {
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS storage (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
             );",
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl PersistentStore for SqliteStore {
    fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>, StoreError> {
        let connection = self.connection.lock();
        let mut statement =
            connection.prepare("SELECT key, value FROM storage WHERE namespace = ?1 ORDER BY key")?;
        let rows = statement
            .query_map(params![namespace], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, rusqlite::Error>>()?;
        Ok(rows)
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.connection.lock().execute(
            "INSERT INTO storage (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![namespace, key, value],
        )?;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.connection.lock().execute(
            "DELETE FROM storage WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }

    fn clear(&self, namespace: &str) -> Result<(), StoreError> {
        self.connection.lock().execute(
            "DELETE FROM storage WHERE namespace = ?1",
            params![namespace],
        )?;
        Ok(())
    }
}
