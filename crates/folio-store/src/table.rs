//! Whole-table snapshots stored under fixed keys in the key-value area.
//!
//! A table is a JSON array of flat records kept under one storage key. Every
//! write replaces the whole array; the last writer wins.

use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::kv::KvBackend;

/// A flat stored record.
pub type Row = Map<String, Value>;

/// The logical tables known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Posts,
    Comments,
}

impl Table {
    /// All tables, in declaration order.
    pub const ALL: [Table; 3] = [Table::Users, Table::Posts, Table::Comments];

    /// Key under which the table snapshot lives in the key-value area.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Users => "sql_db_users_v2",
            Self::Posts => "sql_db_posts_v2",
            Self::Comments => "sql_db_comments_v1",
        }
    }

    /// Logical table name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
            Self::Comments => "comments",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown table: {s}")))
    }
}

/// Reads and writes table snapshots through a [`KvBackend`].
#[derive(Debug, Clone)]
pub struct TableStore<K> {
    kv: K,
}

impl<K: KvBackend> TableStore<K> {
    /// Create a table store over `kv`.
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Read the full snapshot of `table` in insertion order.
    ///
    /// A missing, unreadable, or corrupt snapshot reads as an empty table.
    #[instrument(skip(self))]
    pub fn read(&self, table: Table) -> Vec<Row> {
        let raw = match self.kv.get(table.storage_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%table, %err, "table snapshot unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(values) => values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(row) => Some(row),
                    other => {
                        warn!(%table, value = %other, "skipping non-object row");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                warn!(%table, %err, "table snapshot corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Overwrite the snapshot of `table` with `rows`.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub fn write(&self, table: Table, rows: &[Row]) -> StoreResult<()> {
        let raw = serde_json::to_string(rows)?;
        self.kv.set(table.storage_key(), &raw)?;
        debug!(%table, "table snapshot written");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
