//! SQLite database handle shared by the key-value area and the blob area.
//!
//! The [`Database`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>`. Table snapshots are read and written synchronously via
//! [`Database::call`]; blob traffic goes through [`Database::execute`], which
//! hops onto the blocking pool with `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration::{self, Schema};

/// Thread-safe handle to a SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path` and apply pragmas.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database and bring `schema` up to date.
    pub async fn open_and_migrate(
        path: impl AsRef<Path> + Send + 'static,
        schema: Schema,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        db.run_migrations(schema).await?;
        Ok(db)
    }

    /// Run all pending migrations of `schema`.
    pub async fn run_migrations(&self, schema: Schema) -> StoreResult<()> {
        self.execute(move |conn| migration::run_all(conn, schema))
            .await
    }

    /// Run `schema` migrations on the calling thread.
    pub fn run_migrations_blocking(&self, schema: Schema) -> StoreResult<()> {
        self.call(|conn| migration::run_all(conn, schema))
    }

    /// Run a closure against the connection on the calling thread.
    ///
    /// Table snapshots are small and every UI action reads or writes one of
    /// them to completion, so the key-value area uses this path.
    pub fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
        f(&conn)
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let count = conn.query_row("SELECT count(*) FROM files", [], |row| row.get(0))?;
    ///     Ok(count)
    /// }).await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: readers never block the single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        // Two handles (CLI invocations) may touch the same file.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_works() {
        let db = Database::open_in_memory().unwrap();
        let version: String = db
            .execute(|conn| {
                let v: String =
                    conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
                Ok(v)
            })
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn call_runs_on_current_thread() {
        let db = Database::open_in_memory().unwrap();
        let one: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn tables_schema_runs_on_fresh_db() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations(Schema::Tables).await.unwrap();

        let count: i64 = db
            .execute(|conn| {
                let c: i64 =
                    conn.query_row("SELECT count(*) FROM kv_entries", [], |row| row.get(0))?;
                Ok(c)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn blobs_schema_runs_blocking() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations_blocking(Schema::Blobs).unwrap();

        let count: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT count(*) FROM files", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
