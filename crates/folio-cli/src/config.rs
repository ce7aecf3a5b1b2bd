//! Configuration loaded from `config/default.toml`.
//!
//! Every key is optional. A missing file yields the defaults; a file that
//! exists but does not parse is an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use folio_auth::AdminCredential;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    pub storage: StorageConfig,
    pub log: LogConfig,
    /// Overrides the built-in administrator credential when present.
    pub admin: Option<AdminConfig>,
}

/// `[storage]`: where the two SQLite files live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Key-value tables and the session.
    pub tables_file: String,
    /// Blob area (profile images).
    pub blobs_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tables_file: "folio.db".to_string(),
            blobs_file: "files.db".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn tables_path(&self) -> PathBuf {
        self.data_dir.join(&self.tables_file)
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.data_dir.join(&self.blobs_file)
    }
}

/// `[log]`: default filter when `RUST_LOG` is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// `[admin]`: the administrator override credential.
#[derive(Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl From<AdminConfig> for AdminCredential {
    fn from(cfg: AdminConfig) -> Self {
        let name = cfg
            .display_name
            .unwrap_or_else(|| folio_auth::admin::DEFAULT_ADMIN_NAME.to_string());
        AdminCredential::new(cfg.email, cfg.password, name)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl FolioConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        toml::from_str(&content).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// The administrator credential in effect.
    pub fn admin_credential(&self) -> AdminCredential {
        self.admin.clone().map(AdminCredential::from).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FolioConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.storage.tables_path(), PathBuf::from("data/folio.db"));
        assert_eq!(cfg.storage.blobs_path(), PathBuf::from("data/files.db"));
        assert_eq!(cfg.log.level, "warn");
        assert_eq!(cfg.admin_credential(), AdminCredential::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/var/lib/folio\"\n").unwrap();

        let cfg = FolioConfig::load(&path).unwrap();
        assert_eq!(
            cfg.storage.tables_path(),
            PathBuf::from("/var/lib/folio/folio.db")
        );
        assert_eq!(cfg.log.level, "warn");
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn admin_section_overrides_credential() {
        let cfg: FolioConfig = toml::from_str(
            r#"
            [log]
            level = "debug"

            [admin]
            email = "me@blog.dev"
            password = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log.level, "debug");

        let admin = cfg.admin_credential();
        assert_eq!(admin.email, "me@blog.dev");
        assert_eq!(admin.password, "s3cret");
        assert_eq!(admin.display_name, folio_auth::admin::DEFAULT_ADMIN_NAME);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[storage\n").unwrap();
        assert!(FolioConfig::load(&path).is_err());
    }

    #[test]
    fn admin_debug_hides_password() {
        let cfg = AdminConfig {
            email: "me@blog.dev".into(),
            password: "s3cret".into(),
            display_name: None,
        };
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }
}
