//! # folio-store
//!
//! Storage layer for Folio.
//!
//! Two separate areas back the application: a string key-value area that
//! holds whole-table JSON snapshots plus the current session, and an
//! asynchronous blob area for binary payloads such as profile images.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ContentService      (posts, comments)        │
//! ├──────────────────────────────────────────────┤
//! │  QueryEngine         (closed Statement set)   │
//! │  TableStore          (JSON array per table)   │
//! │  SessionHolder       (current user)           │
//! ├──────────────────────────────────────────────┤
//! │  KvBackend           SqliteKv | MemoryKv      │
//! │  BlobStore (async)   SqliteBlobStore | Memory │
//! ├──────────────────────────────────────────────┤
//! │  Database (rusqlite WAL) + Migrations         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use folio_store::{ContentService, Database, Schema, SqliteBlobStore, SqliteKv};
//!
//! let db = Database::open_and_migrate("data/folio.db", Schema::Tables).await?;
//! let kv = std::sync::Arc::new(SqliteKv::new(db));
//! let blobs = SqliteBlobStore::open("data/files.db").await?;
//! let content = ContentService::new(kv.clone());
//! ```

pub mod blob;
pub mod content;
pub mod db;
pub mod error;
pub mod kv;
pub mod migration;
pub mod models;
pub mod query;
pub mod session;
pub mod table;

// ── re-exports ───────────────────────────────────────────────────────

pub use blob::{Blob, BlobStore, MemoryBlobStore, SqliteBlobStore, profile_image_key};
pub use content::ContentService;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use kv::{KvBackend, MemoryKv, SqliteKv};
pub use migration::Schema;
pub use models::{BlogPost, Comment, Role, Session, User, UserRecord};
pub use query::{QueryEngine, RowOrder, Statement, field_eq, to_row};
pub use session::{SESSION_KEY, SessionHolder};
pub use table::{Row, Table, TableStore};
