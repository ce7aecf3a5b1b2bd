//! Key-value area for whole-table snapshots and the session.
//!
//! [`KvBackend`] is the seam every table-level component is built on. The
//! SQLite implementation stores string values in `kv_entries`; the
//! in-memory implementation is used by tests and embedding.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Synchronous string-to-string persistent storage.
pub trait KvBackend: Send + Sync {
    /// Get a value by key, returning `None` if not found.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a value for a key (insert or overwrite).
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key, returning `true` if it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;
}

impl<K: KvBackend + ?Sized> KvBackend for std::sync::Arc<K> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        (**self).remove(key)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  SQLite backend
// ═══════════════════════════════════════════════════════════════════════

/// Persistent key-value area backed by the `kv_entries` table.
#[derive(Clone, Debug)]
pub struct SqliteKv {
    db: Database,
}

impl SqliteKv {
    /// Create a key-value area backed by `db`.
    ///
    /// `db` must have had [`Schema::Tables`](crate::migration::Schema::Tables)
    /// migrations applied.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl KvBackend for SqliteKv {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.db.call(|conn| {
            let result = conn.query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            );
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    #[instrument(skip(self, value), fields(len = value.len()))]
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.db.call(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, now],
            )?;
            debug!(key = %key, "kv entry written");
            Ok(())
        })
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.db.call(|conn| {
            let deleted = conn.execute(
                "DELETE FROM kv_entries WHERE key = ?1",
                rusqlite::params![key],
            )?;
            Ok(deleted > 0)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  In-memory backend
// ═══════════════════════════════════════════════════════════════════════

/// `HashMap`-backed key-value area for tests.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    /// Create an empty area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::TaskJoin(format!("lock poisoned: {e}"))
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.entries.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.entries.write().map_err(poisoned)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().map_err(poisoned)?;
        Ok(map.remove(key).is_some())
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Schema;

    fn sqlite_kv() -> SqliteKv {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations_blocking(Schema::Tables).unwrap();
        SqliteKv::new(db)
    }

    fn backends() -> Vec<Box<dyn KvBackend>> {
        vec![Box::new(sqlite_kv()), Box::new(MemoryKv::new())]
    }

    #[test]
    fn get_nonexistent_returns_none() {
        for kv in backends() {
            assert!(kv.get("missing").unwrap().is_none());
        }
    }

    #[test]
    fn set_and_get() {
        for kv in backends() {
            kv.set("key1", "value1").unwrap();
            assert_eq!(kv.get("key1").unwrap(), Some("value1".to_string()));
        }
    }

    #[test]
    fn set_overwrites() {
        for kv in backends() {
            kv.set("key1", "old").unwrap();
            kv.set("key1", "new").unwrap();
            assert_eq!(kv.get("key1").unwrap(), Some("new".to_string()));
        }
    }

    #[test]
    fn remove_existing_and_missing() {
        for kv in backends() {
            kv.set("key1", "val").unwrap();
            assert!(kv.remove("key1").unwrap());
            assert!(kv.get("key1").unwrap().is_none());
            assert!(!kv.remove("key1").unwrap());
        }
    }

    #[test]
    fn memory_len_tracks_keys() {
        let kv = MemoryKv::new();
        assert!(kv.is_empty());
        kv.set("a", "1").unwrap();
        kv.set("b", "2").unwrap();
        assert_eq!(kv.len(), 2);
    }
}
