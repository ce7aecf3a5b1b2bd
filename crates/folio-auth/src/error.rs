//! Error types for the auth crate.
//!
//! All auth operations surface errors through [`AuthError`]. The display
//! strings are complete sentences meant to be shown to the end user as-is.

use folio_store::StoreError;

/// Unified error type for Folio authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Registration with an email that already has an account.
    #[error("this email is already registered")]
    DuplicateEmail,

    /// Registration with the administrator email without the override password.
    #[error("this email is reserved for the site administrator")]
    ReservedEmail,

    /// No account matches the given email and password.
    #[error("incorrect email or password")]
    InvalidCredentials,

    /// The account being updated does not exist.
    #[error("user not found")]
    UserNotFound,

    /// The current password supplied for a password change is wrong.
    #[error("the current password is incorrect")]
    InvalidOldPassword,

    /// The administrator's override password cannot be changed through the
    /// regular password flow.
    #[error("the administrator password cannot be changed here")]
    AdminPasswordProtected,

    /// The operation needs a logged-in user and there is none.
    #[error("you need to log in first")]
    NotAuthenticated,

    /// An error propagated from the storage layer.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_user_facing() {
        assert_eq!(
            AuthError::DuplicateEmail.to_string(),
            "this email is already registered"
        );
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "incorrect email or password"
        );
        assert_eq!(
            AuthError::AdminPasswordProtected.to_string(),
            "the administrator password cannot be changed here"
        );
    }

    #[test]
    fn error_wraps_store_errors() {
        let err: AuthError = StoreError::Blob("disk full".into()).into();
        assert!(matches!(err, AuthError::Store(_)));
        assert_eq!(err.to_string(), "storage error: blob store error: disk full");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthError>();
    }
}
