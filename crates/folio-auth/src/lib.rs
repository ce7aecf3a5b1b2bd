//! Authentication for Folio.
//!
//! This crate provides account management on top of `folio-store`:
//!
//! - **Registration** of GUEST accounts, plus the administrator claim
//! - **Credential checks**, including the administrator override
//! - **Profile edits**: display name and profile image
//! - **Sessions** that survive restarts
//!
//! # Architecture
//!
//! ```text
//! AuthManager
//! ├── AuthService     (users table + blob area)
//! │   └── AdminCredential
//! └── SessionHolder   (persisted {email, name, role})
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use folio_auth::AuthManager;
//! use folio_store::{MemoryBlobStore, MemoryKv};
//!
//! # async fn example() -> folio_auth::error::Result<()> {
//! let kv = Arc::new(MemoryKv::new());
//! let manager = AuthManager::new(kv, Arc::new(MemoryBlobStore::new()));
//!
//! manager.restore().await;
//! let user = manager.signup("ann@example.com", "Ann", "hunter2")?;
//! println!("logged in as {} ({})", user.name, user.role);
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod error;
pub mod manager;
pub mod service;

// Re-export key types at the crate root for convenience.
pub use admin::AdminCredential;
pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use service::AuthService;
