//! Persistence of the logged-in user between runs.
//!
//! Only `{email, name, role}` is written. The password never reaches the
//! session, and the profile image is rehydrated from the blob area on
//! restore instead of being serialized.

use tracing::{debug, instrument, warn};

use crate::error::StoreResult;
use crate::kv::KvBackend;
use crate::models::{Session, User};

/// Key under which the current session is stored.
pub const SESSION_KEY: &str = "sql_session_user_v2";

/// Saves, loads, and clears the current session.
#[derive(Debug, Clone)]
pub struct SessionHolder<K> {
    kv: K,
}

impl<K: KvBackend> SessionHolder<K> {
    /// Create a session holder over `kv`.
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Persist the public fields of `user`.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn save(&self, user: &User) -> StoreResult<()> {
        let raw = serde_json::to_string(&Session::from(user))?;
        self.kv.set(SESSION_KEY, &raw)?;
        debug!("session saved");
        Ok(())
    }

    /// The stored session, if any.
    ///
    /// A corrupt or unreadable session is treated as logged out.
    #[instrument(skip(self))]
    pub fn load(&self) -> Option<Session> {
        let raw = match self.kv.get(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(%err, "session unreadable, treating as logged out");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(%err, "session corrupt, treating as logged out");
                None
            }
        }
    }

    /// Forget the current session.
    #[instrument(skip(self))]
    pub fn clear(&self) -> StoreResult<()> {
        if self.kv.remove(SESSION_KEY)? {
            debug!("session cleared");
        }
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
