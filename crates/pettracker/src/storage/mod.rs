//! Storage layer for pettracker.
//!
//! The tracker persists everything as JSON blobs under string keys, the
//! layout browser local storage imposes. [`KeyValueStore`] is that seam;
//! [`SqliteStore`] backs it with a file and [`MemoryStore`] keeps values for
//! the life of the process (session-scoped state and tests).
//! [`Persistence`] adds typed JSON access on top.

pub mod keys;
pub mod migrations;
mod persistence;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use keys::StorageKey;
pub use persistence::Persistence;

/// A string key-value store with local-storage semantics.
///
/// Writes replace the whole value; there are no transactions across keys.
pub trait KeyValueStore: Send {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<()>;

    /// List keys starting with `prefix`, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// `SQLite`-backed key-value store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory `SQLite` store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value],
        )?;
        debug!(key, bytes = value.len(), "Stored entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let affected = self.conn.execute("DELETE FROM entries WHERE key = ?1", [key])?;
        if affected > 0 {
            debug!(key, "Removed entry");
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map([prefix], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

/// Process-lifetime key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::internal("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("petTracker_nfcTag").unwrap(), None);

        store.set("petTracker_nfcTag", "\"Rex2024\"").unwrap();
        assert_eq!(
            store.get("petTracker_nfcTag").unwrap().as_deref(),
            Some("\"Rex2024\"")
        );

        store.set("petTracker_nfcTag", "\"Max2024\"").unwrap();
        assert_eq!(
            store.get("petTracker_nfcTag").unwrap().as_deref(),
            Some("\"Max2024\"")
        );

        store.remove("petTracker_nfcTag").unwrap();
        assert_eq!(store.get("petTracker_nfcTag").unwrap(), None);
        store.remove("petTracker_nfcTag").unwrap();
    }

    #[test]
    fn test_sqlite_store_get_set_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        exercise(&store);
    }

    #[test]
    fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        exercise(&store);
    }

    #[test]
    fn test_keys_with_prefix() {
        let stores: Vec<Box<dyn KeyValueStore>> = vec![
            Box::new(SqliteStore::open_in_memory().unwrap()),
            Box::new(MemoryStore::new()),
        ];
        for store in stores {
            store.set("petTracker_contact_Rex2024", "{}").unwrap();
            store.set("petTracker_contact_Max2024", "{}").unwrap();
            store.set("petTracker_medical_Rex2024", "{}").unwrap();

            let keys = store.keys_with_prefix("petTracker_contact_").unwrap();
            assert_eq!(
                keys,
                vec![
                    "petTracker_contact_Max2024".to_string(),
                    "petTracker_contact_Rex2024".to_string()
                ]
            );
        }
    }

    #[test]
    fn test_prefix_is_literal_not_like_pattern() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("petTracker_contact_Rex2024", "{}").unwrap();
        store.set("petTrackerXcontact_Rex2024", "{}").unwrap();

        let keys = store.keys_with_prefix("petTracker_contact_").unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tracker.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("petTracker_nfcTag", "\"Rex2024\"").unwrap();
            assert_eq!(store.path(), path.as_path());
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("petTracker_nfcTag").unwrap().as_deref(),
            Some("\"Rex2024\"")
        );
        assert_eq!(store.count().unwrap(), 1);
    }
}
