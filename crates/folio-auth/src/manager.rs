//! Session-aware authentication.
//!
//! The [`AuthManager`] tracks who is logged in. It wraps an [`AuthService`]
//! with a [`SessionHolder`] so a login outlives the process, and it is the
//! primary entry point for front ends.
//!
//! ```text
//!                 signup / login
//!  ┌─────────────────┐ ───────────────▶ ┌───────────────┐
//!  │ unauthenticated │                  │ authenticated │
//!  └─────────────────┘ ◀─────────────── └───────────────┘
//!                        logout
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use folio_store::{Blob, BlobStore, KvBackend, SessionHolder, User};
use tracing::{debug, info};

use crate::admin::AdminCredential;
use crate::error::{AuthError, Result};
use crate::service::AuthService;

// ---------------------------------------------------------------------------
// AuthManager
// ---------------------------------------------------------------------------

/// Tracks the logged-in user and persists it as the session.
pub struct AuthManager<K, B: ?Sized> {
    auth: AuthService<K, B>,
    session: SessionHolder<K>,
    current: Mutex<Option<User>>,
}

impl<K: KvBackend + Clone, B: BlobStore + ?Sized> AuthManager<K, B> {
    /// Create a manager whose accounts and session share the key-value area
    /// `kv`.
    pub fn new(kv: K, blobs: Arc<B>) -> Self {
        Self::from_parts(AuthService::new(kv.clone(), blobs), SessionHolder::new(kv))
    }
}

impl<K: KvBackend, B: BlobStore + ?Sized> AuthManager<K, B> {
    /// Assemble a manager from an existing service and session holder.
    pub fn from_parts(auth: AuthService<K, B>, session: SessionHolder<K>) -> Self {
        Self {
            auth,
            session,
            current: Mutex::new(None),
        }
    }

    /// Replace the administrator credential.
    pub fn with_admin(mut self, admin: AdminCredential) -> Self {
        self.auth = self.auth.with_admin(admin);
        self
    }

    /// The underlying account service.
    pub fn service(&self) -> &AuthService<K, B> {
        &self.auth
    }

    /// Reload the persisted session, attaching the stored profile image.
    ///
    /// Called once at startup. Returns the restored user, if any.
    pub async fn restore(&self) -> Option<User> {
        let user = match self.session.load() {
            Some(session) => {
                let picture = self.auth.profile_image(&session.email).await;
                Some(session.into_user(picture))
            }
            None => None,
        };
        if let Some(user) = &user {
            debug!(email = %user.email, "session restored");
        }
        self.set_current(user.clone());
        user
    }

    /// The logged-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether someone is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    /// Register a new account and log it in.
    ///
    /// # Errors
    ///
    /// Any error from [`AuthService::register`], or a storage error while
    /// saving the session.
    pub fn signup(&self, email: &str, name: &str, password: &str) -> Result<User> {
        let user = self.auth.register(email, name, password)?;
        self.start_session(user)
    }

    /// Check credentials and log the account in.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] on a failed check, or a storage
    /// error while saving the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let mut user = self.auth.verify(email, password)?;
        user.profile_picture = self.auth.profile_image(&user.email).await;
        self.start_session(user)
    }

    /// Log out and forget the persisted session.
    pub fn logout(&self) -> Result<()> {
        self.set_current(None);
        self.session.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Rename the logged-in user and optionally replace the profile image.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when nobody is logged in, otherwise
    /// any error from [`AuthService::update_profile`].
    pub async fn update_profile(&self, name: &str, picture: Option<Blob>) -> Result<User> {
        let current = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        let user = self
            .auth
            .update_profile(&current.email, name, picture)
            .await?;
        self.start_session(user)
    }

    /// Change the logged-in user's password.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when nobody is logged in, otherwise
    /// any error from [`AuthService::change_password`].
    pub fn change_password(&self, old: &str, new: &str) -> Result<()> {
        let current = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        self.auth.change_password(&current.email, old, new)
    }

    fn start_session(&self, user: User) -> Result<User> {
        self.session.save(&user)?;
        self.set_current(Some(user.clone()));
        info!(email = %user.email, role = %user.role, "session started");
        Ok(user)
    }

    fn set_current(&self, user: Option<User>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

impl<K: std::fmt::Debug, B: ?Sized> std::fmt::Debug for AuthManager<K, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("auth", &self.auth)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
