//! Blob area for binary payloads such as profile images.
//!
//! Kept apart from the key-value tables: payloads can be large, and every
//! operation is asynchronous. [`SqliteBlobStore`] normally lives in its own
//! database file; its `files` store is created by [`Schema::Blobs`] on first
//! open, even when that file already holds the key-value tables.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::migration::Schema;

/// Content type used when none is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Key under which a user's profile image is stored.
pub fn profile_image_key(email: &str) -> String {
    format!("pfp_{email}")
}

/// A binary payload with its media type.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Blob {
    /// Wrap `data` with an explicit media type.
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Wrap `data` as `application/octet-stream`.
    pub fn octet_stream(data: impl Into<Vec<u8>>) -> Self {
        Self::new(DEFAULT_CONTENT_TYPE, data)
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inline display URL: `data:<type>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.data))
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Asynchronous keyed storage for binary payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `blob` under `key`, replacing any previous payload.
    async fn put(&self, key: &str, blob: Blob) -> StoreResult<()>;

    /// Fetch the payload under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Blob>>;

    /// Remove the payload under `key`, returning `true` if it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// All stored keys, sorted.
    async fn keys(&self) -> StoreResult<Vec<String>>;
}

// ═══════════════════════════════════════════════════════════════════════
//  SQLite backend
// ═══════════════════════════════════════════════════════════════════════

/// Blob store backed by the `files` table of its own database.
#[derive(Clone, Debug)]
pub struct SqliteBlobStore {
    db: Database,
}

impl SqliteBlobStore {
    /// Open (or create) the blob database at `path`, initialising its schema.
    pub async fn open(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let db = Database::open_and_migrate(path, Schema::Blobs).await?;
        Ok(Self { db })
    }

    /// Wrap an already-migrated database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    #[instrument(skip(self, blob), fields(len = blob.len(), content_type = %blob.content_type))]
    async fn put(&self, key: &str, blob: Blob) -> StoreResult<()> {
        let key = key.to_string();
        let now = chrono::Utc::now().timestamp();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO files (key, content_type, data, updated_at) VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(key) DO UPDATE SET content_type = excluded.content_type, \
                     data = excluded.data, updated_at = excluded.updated_at",
                    rusqlite::params![key, blob.content_type, blob.data, now],
                )?;
                debug!(key = %key, "blob stored");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<Blob>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT content_type, data FROM files WHERE key = ?1",
                    rusqlite::params![key],
                    |row| {
                        Ok(Blob {
                            content_type: row.get(0)?,
                            data: row.get(1)?,
                        })
                    },
                );
                match result {
                    Ok(blob) => Ok(Some(blob)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM files WHERE key = ?1", rusqlite::params![key])?;
                Ok(deleted > 0)
            })
            .await
    }

    #[instrument(skip(self))]
    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT key FROM files ORDER BY key ASC")?;
                let keys = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  In-memory backend
// ═══════════════════════════════════════════════════════════════════════

/// `HashMap`-backed blob store for tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Blob(format!("lock poisoned: {e}"))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, blob: Blob) -> StoreResult<()> {
        let mut map = self.blobs.write().map_err(poisoned)?;
        map.insert(key.to_string(), blob);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Blob>> {
        let map = self.blobs.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.blobs.write().map_err(poisoned)?;
        Ok(map.remove(key).is_some())
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let map = self.blobs.read().map_err(poisoned)?;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ── tests ────────────────────────────────────────────────────────────
