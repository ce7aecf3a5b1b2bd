//! The built-in administrator override.
//!
//! One email/password pair grants the ADMIN role regardless of what the
//! users table holds. Registering with it claims the admin account; logging
//! in with it bypasses the table entirely.

/// Default administrator email.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@folio.local";

/// Default override password.
pub const DEFAULT_ADMIN_PASSWORD: &str = "folio-owner";

/// Display name given to the administrator on claim and login.
pub const DEFAULT_ADMIN_NAME: &str = "Site Owner";

/// The override credential and the name the administrator is shown under.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredential {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl AdminCredential {
    /// Build a credential from its parts.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
        }
    }

    /// Whether `email` is the administrator email, ignoring ASCII case.
    pub fn is_admin_email(&self, email: &str) -> bool {
        email.eq_ignore_ascii_case(&self.email)
    }

    /// Whether `email`/`password` is the override pair.
    ///
    /// The email compares case-insensitively, the password exactly.
    pub fn matches(&self, email: &str, password: &str) -> bool {
        self.is_admin_email(email) && password == self.password
    }
}

impl Default for AdminCredential {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_NAME)
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
