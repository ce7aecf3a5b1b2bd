//! Typed query layer over the table snapshots.
//!
//! Callers describe what they want as a [`Statement`] and [`QueryEngine`]
//! runs it against the [`TableStore`]. The set of statements is closed: every
//! insert names its record type, so a row can only land in the table that
//! owns its shape.

use std::cmp::Reverse;

use chrono::DateTime;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::kv::KvBackend;
use crate::models::{BlogPost, Comment, UserRecord};
use crate::table::{Row, Table, TableStore};

/// Ordering applied to a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Rows as they appear in the snapshot.
    #[default]
    Insertion,
    /// Newest `createdAt` first. Rows without a parseable timestamp go last.
    CreatedAtDesc,
}

/// A single operation against one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Append one user row.
    InsertUser(UserRecord),
    /// Append one post row.
    InsertPost(BlogPost),
    /// Append one comment row.
    InsertComment(Comment),
    /// Remove every row whose `id` equals `id`.
    DeleteById { table: Table, id: String },
    /// Every row of `table`.
    SelectAll { table: Table, order: RowOrder },
    /// Rows of `table` whose `id` equals `id`.
    SelectById { table: Table, id: String },
    /// Users whose `email` equals `email` exactly.
    SelectByEmail { email: String },
    /// Users whose `email` and `password` both match exactly.
    SelectByEmailPassword { email: String, password: String },
    /// Comments attached to `post_id`.
    SelectByPostId { post_id: String, order: RowOrder },
}

impl Statement {
    /// The table this statement reads or writes.
    pub fn table(&self) -> Table {
        match self {
            Self::InsertUser(_) | Self::SelectByEmail { .. } | Self::SelectByEmailPassword { .. } => {
                Table::Users
            }
            Self::InsertPost(_) => Table::Posts,
            Self::InsertComment(_) | Self::SelectByPostId { .. } => Table::Comments,
            Self::DeleteById { table, .. }
            | Self::SelectAll { table, .. }
            | Self::SelectById { table, .. } => *table,
        }
    }

    /// Short operation name for logs.
    fn kind(&self) -> &'static str {
        match self {
            Self::InsertUser(_) | Self::InsertPost(_) | Self::InsertComment(_) => "insert",
            Self::DeleteById { .. } => "delete_by_id",
            Self::SelectAll { .. } => "select_all",
            Self::SelectById { .. } => "select_by_id",
            Self::SelectByEmail { .. } => "select_by_email",
            Self::SelectByEmailPassword { .. } => "select_by_email_password",
            Self::SelectByPostId { .. } => "select_by_post_id",
        }
    }
}

/// Executes [`Statement`]s against a [`TableStore`].
#[derive(Debug, Clone)]
pub struct QueryEngine<K> {
    tables: TableStore<K>,
}

impl<K: KvBackend> QueryEngine<K> {
    /// Create an engine over `kv`.
    pub fn new(kv: K) -> Self {
        Self {
            tables: TableStore::new(kv),
        }
    }

    /// Run `stmt`, returning matching rows for selects and nothing for writes.
    #[instrument(skip_all, fields(op = stmt.kind(), table = %stmt.table()))]
    pub fn execute(&self, stmt: Statement) -> StoreResult<Vec<Row>> {
        let table = stmt.table();
        match stmt {
            Statement::InsertUser(record) => self.insert(table, &record),
            Statement::InsertPost(post) => self.insert(table, &post),
            Statement::InsertComment(comment) => self.insert(table, &comment),
            Statement::DeleteById { id, .. } => {
                let mut rows = self.tables.read(table);
                let before = rows.len();
                rows.retain(|row| !field_eq(row, "id", &id));
                let removed = before - rows.len();
                if removed > 0 {
                    self.tables.write(table, &rows)?;
                }
                debug!(removed, "rows deleted");
                Ok(Vec::new())
            }
            Statement::SelectAll { order, .. } => Ok(ordered(self.tables.read(table), order)),
            Statement::SelectById { id, .. } => Ok(self.select(table, |row| field_eq(row, "id", &id))),
            Statement::SelectByEmail { email } => {
                Ok(self.select(table, |row| field_eq(row, "email", &email)))
            }
            Statement::SelectByEmailPassword { email, password } => Ok(self.select(table, |row| {
                field_eq(row, "email", &email) && field_eq(row, "password", &password)
            })),
            Statement::SelectByPostId { post_id, order } => Ok(ordered(
                self.select(table, |row| field_eq(row, "postId", &post_id)),
                order,
            )),
        }
    }

    /// Run `stmt` and decode the resulting rows as `T`.
    ///
    /// Rows that do not decode are skipped.
    pub fn fetch<T: DeserializeOwned>(&self, stmt: Statement) -> StoreResult<Vec<T>> {
        let table = stmt.table();
        let rows = self.execute(stmt)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(Value::Object(row)) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(%table, %err, "skipping row that does not match record shape");
                    None
                }
            })
            .collect())
    }

    /// Read `table`, let `f` edit the rows in place, and write the result back.
    ///
    /// Nothing is written when `f` returns an error.
    #[instrument(skip(self, f))]
    pub fn rewrite<F, R, E>(&self, table: Table, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Vec<Row>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut rows = self.tables.read(table);
        let out = f(&mut rows)?;
        self.tables.write(table, &rows)?;
        Ok(out)
    }

    fn insert<T: Serialize>(&self, table: Table, record: &T) -> StoreResult<Vec<Row>> {
        let row = to_row(record)?;
        let mut rows = self.tables.read(table);
        rows.push(row);
        self.tables.write(table, &rows)?;
        debug!(rows = rows.len(), "row inserted");
        Ok(Vec::new())
    }

    fn select(&self, table: Table, pred: impl Fn(&Row) -> bool) -> Vec<Row> {
        self.tables
            .read(table)
            .into_iter()
            .filter(|row| pred(row))
            .collect()
    }
}

/// Serialize `record` into a flat row.
pub fn to_row<T: Serialize>(record: &T) -> StoreResult<Row> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::InvalidArgument(format!(
            "record is not an object: {other}"
        ))),
    }
}

/// Whether `row[field]` is the string `value`.
pub fn field_eq(row: &Row, field: &str, value: &str) -> bool {
    row.get(field).and_then(Value::as_str) == Some(value)
}

fn created_at_millis(row: &Row) -> Option<i64> {
    row.get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
}

fn ordered(mut rows: Vec<Row>, order: RowOrder) -> Vec<Row> {
    if order == RowOrder::CreatedAtDesc {
        // Stable: equal or missing timestamps keep insertion order.
        rows.sort_by_cached_key(|row| Reverse(created_at_millis(row)));
    }
    rows
}

// ── tests ────────────────────────────────────────────────────────────
