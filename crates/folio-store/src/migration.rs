//! Schema migration system.
//!
//! A database file carries one or more [`Schema`]s. Their migrations are
//! static SQL strings keyed by version number; the applied version of each
//! schema is tracked in a `_migrations` table so reopening an existing file
//! is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// Which database file a migration set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// The key-value area holding whole-table snapshots and the session.
    Tables,
    /// The object store holding binary payloads such as profile images.
    Blobs,
}

impl Schema {
    /// Key under which this schema's versions are recorded in `_migrations`.
    fn ledger_key(self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Blobs => "blobs",
        }
    }

    /// Latest version this build knows about.
    pub fn latest_version(self) -> u32 {
        self.migrations().last().map(|m| m.version).unwrap_or(0)
    }

    fn migrations(self) -> &'static [Migration] {
        match self {
            Self::Tables => TABLE_MIGRATIONS,
            Self::Blobs => BLOB_MIGRATIONS,
        }
    }
}

/// Key-value area. Add new migrations to the end of this array.
static TABLE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "key-value area, one row per storage key",
    sql: r#"
        CREATE TABLE kv_entries (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
    "#,
}];

/// Blob area. Add new migrations to the end of this array.
static BLOB_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "object store `files`: binary payloads keyed by string id",
    sql: r#"
        CREATE TABLE files (
            key          TEXT PRIMARY KEY,
            content_type TEXT NOT NULL,
            data         BLOB NOT NULL,
            updated_at   INTEGER NOT NULL
        );
    "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations of `schema` against `conn`.
///
/// This is a **synchronous** function; call it from `spawn_blocking` when
/// inside async code.
pub fn run_all(conn: &Connection, schema: Schema) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn, schema)?;
    let pending: Vec<&Migration> = schema
        .migrations()
        .iter()
        .filter(|m| m.version > current)
        .collect();

    if pending.is_empty() {
        debug!(?schema, current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        ?schema,
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, schema, migration)?;
    }

    info!(?schema, new_version = schema.latest_version(), "all migrations applied");
    Ok(())
}

/// Return the latest applied version of `schema`, or 0 if none.
pub fn current_version(conn: &Connection, schema: Schema) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations WHERE schema = ?1",
            [schema.ledger_key()],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            schema      TEXT NOT NULL,
            version     INTEGER NOT NULL,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL,
            PRIMARY KEY (schema, version)
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, schema: Schema, migration: &Migration) -> StoreResult<()> {
    info!(
        ?schema,
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // `conn.transaction()` needs `&mut Connection`, so BEGIN/COMMIT by hand.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> StoreResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO _migrations (schema, version, description, applied_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                schema.ledger_key(),
                migration.version,
                migration.description,
                now
            ],
        )
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to record migration: {e}"),
        })?;

        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
            )
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn migrations_are_ordered() {
        for schema in [Schema::Tables, Schema::Blobs] {
            for window in schema.migrations().windows(2) {
                assert!(
                    window[1].version > window[0].version,
                    "migration versions must be strictly increasing"
                );
            }
        }
    }

    #[test]
    fn run_all_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn, Schema::Tables).unwrap();
        assert_eq!(
            current_version(&conn, Schema::Tables).unwrap(),
            Schema::Tables.latest_version()
        );
        assert_eq!(current_version(&conn, Schema::Blobs).unwrap(), 0);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn, Schema::Blobs).unwrap();
        run_all(&conn, Schema::Blobs).unwrap();
        assert_eq!(current_version(&conn, Schema::Blobs).unwrap(), 1);
    }

    #[test]
    fn each_schema_creates_only_its_store() {
        let tables = Connection::open_in_memory().unwrap();
        run_all(&tables, Schema::Tables).unwrap();
        assert_eq!(table_names(&tables), vec!["kv_entries".to_string()]);

        let blobs = Connection::open_in_memory().unwrap();
        run_all(&blobs, Schema::Blobs).unwrap();
        assert_eq!(table_names(&blobs), vec!["files".to_string()]);
    }

    #[test]
    fn schemas_share_one_file() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn, Schema::Tables).unwrap();
        run_all(&conn, Schema::Blobs).unwrap();
        assert_eq!(
            table_names(&conn),
            vec!["files".to_string(), "kv_entries".to_string()]
        );
        assert_eq!(current_version(&conn, Schema::Tables).unwrap(), 1);
        assert_eq!(current_version(&conn, Schema::Blobs).unwrap(), 1);

        // Reopening in either order applies nothing new.
        run_all(&conn, Schema::Blobs).unwrap();
        run_all(&conn, Schema::Tables).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }
}
