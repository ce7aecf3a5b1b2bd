//! Account operations over the users table and the blob area.
//!
//! [`AuthService`] is stateless apart from its injected storage handles. It
//! knows nothing about who is logged in; see [`AuthManager`](crate::AuthManager)
//! for the session-aware wrapper.
//!
//! Email comparison is exact everywhere except the administrator override in
//! [`register`](AuthService::register) and [`verify`](AuthService::verify),
//! which ignores case.

use std::sync::Arc;

use folio_store::{
    Blob, BlobStore, KvBackend, QueryEngine, Role, Row, Statement, Table, User, UserRecord,
    field_eq, profile_image_key, to_row,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::admin::AdminCredential;
use crate::error::{AuthError, Result};

/// Registration, credential checks, and profile edits.
pub struct AuthService<K, B: ?Sized> {
    query: QueryEngine<K>,
    blobs: Arc<B>,
    admin: AdminCredential,
}

impl<K: KvBackend, B: BlobStore + ?Sized> AuthService<K, B> {
    /// Create a service over the key-value area `kv` and the blob area
    /// `blobs`, with the default administrator credential.
    pub fn new(kv: K, blobs: Arc<B>) -> Self {
        Self {
            query: QueryEngine::new(kv),
            blobs,
            admin: AdminCredential::default(),
        }
    }

    /// Replace the administrator credential.
    pub fn with_admin(mut self, admin: AdminCredential) -> Self {
        self.admin = admin;
        self
    }

    /// Create an account and return its identity.
    ///
    /// Registering with the override pair claims the administrator account:
    /// any earlier row for that email is replaced by a single ADMIN row.
    /// Every other registration creates a GUEST.
    ///
    /// # Errors
    ///
    /// [`AuthError::DuplicateEmail`] if the exact email already has a row,
    /// [`AuthError::ReservedEmail`] for the administrator email without the
    /// override password.
    #[instrument(skip(self, password))]
    pub fn register(&self, email: &str, name: &str, password: &str) -> Result<User> {
        if self.admin.matches(email, password) {
            return self.claim_admin(email, password);
        }

        let existing: Vec<UserRecord> = self.query.fetch(Statement::SelectByEmail {
            email: email.to_string(),
        })?;
        if !existing.is_empty() {
            return Err(AuthError::DuplicateEmail);
        }
        if self.admin.is_admin_email(email) {
            return Err(AuthError::ReservedEmail);
        }

        let record = UserRecord {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
            role: Role::Guest,
        };
        let user = record.to_user();
        self.query.execute(Statement::InsertUser(record))?;
        info!("account registered");
        Ok(user)
    }

    /// Check a login and return the matching identity.
    ///
    /// The override pair always succeeds, even with no row in the table.
    #[instrument(skip(self, password))]
    pub fn verify(&self, email: &str, password: &str) -> Result<User> {
        if self.admin.matches(email, password) {
            debug!("administrator override accepted");
            return Ok(self.admin_user(email));
        }

        let found: Vec<UserRecord> = self.query.fetch(Statement::SelectByEmailPassword {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        found
            .first()
            .map(UserRecord::to_user)
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Rename `email` and optionally replace its profile image.
    ///
    /// A missing administrator row is created on the fly. Without a new
    /// picture the returned user carries whatever image is already stored.
    ///
    /// # Errors
    ///
    /// [`AuthError::UserNotFound`] when `email` has no row and is not the
    /// administrator email. Blob-area failures while storing the picture
    /// propagate.
    #[instrument(skip(self, picture), fields(has_picture = picture.is_some()))]
    pub async fn update_profile(
        &self,
        email: &str,
        name: &str,
        picture: Option<Blob>,
    ) -> Result<User> {
        let role = self.query.rewrite(Table::Users, |rows| -> Result<Role> {
            match rows.iter_mut().find(|row| field_eq(row, "email", email)) {
                Some(row) => {
                    row.insert("name".into(), Value::String(name.to_string()));
                    Ok(stored_role(row))
                }
                None if email == self.admin.email => {
                    rows.push(to_row(&UserRecord {
                        email: email.to_string(),
                        name: name.to_string(),
                        password: self.admin.password.clone(),
                        role: Role::Admin,
                    })?);
                    debug!("administrator row created");
                    Ok(Role::Admin)
                }
                None => Err(AuthError::UserNotFound),
            }
        })?;

        let profile_picture = match picture {
            Some(blob) => {
                let url = blob.to_data_url();
                self.blobs.put(&profile_image_key(email), blob).await?;
                debug!("profile image stored");
                Some(url)
            }
            None => self.profile_image(email).await,
        };

        Ok(User {
            email: email.to_string(),
            name: name.to_string(),
            role,
            profile_picture,
        })
    }

    /// Replace the stored password for `email`.
    ///
    /// # Errors
    ///
    /// [`AuthError::AdminPasswordProtected`] when the administrator presents
    /// the override password as `old`. Otherwise
    /// [`AuthError::UserNotFound`] or [`AuthError::InvalidOldPassword`].
    #[instrument(skip(self, old, new))]
    pub fn change_password(&self, email: &str, old: &str, new: &str) -> Result<()> {
        if email == self.admin.email && old == self.admin.password {
            return Err(AuthError::AdminPasswordProtected);
        }

        self.query.rewrite(Table::Users, |rows| -> Result<()> {
            let row = rows
                .iter_mut()
                .find(|row| field_eq(row, "email", email))
                .ok_or(AuthError::UserNotFound)?;
            if !field_eq(row, "password", old) {
                return Err(AuthError::InvalidOldPassword);
            }
            row.insert("password".into(), Value::String(new.to_string()));
            Ok(())
        })?;
        info!("password changed");
        Ok(())
    }

    /// Display URL of the stored profile image for `email`, if any.
    ///
    /// Blob-area failures read as "no image".
    #[instrument(skip(self))]
    pub async fn profile_image(&self, email: &str) -> Option<String> {
        match self.blobs.get(&profile_image_key(email)).await {
            Ok(blob) => blob.map(|b| b.to_data_url()),
            Err(err) => {
                warn!(%err, "failed to load profile image");
                None
            }
        }
    }

    fn claim_admin(&self, email: &str, password: &str) -> Result<User> {
        let row = to_row(&UserRecord {
            email: email.to_string(),
            name: self.admin.display_name.clone(),
            password: password.to_string(),
            role: Role::Admin,
        })?;
        self.query.rewrite(Table::Users, |rows| {
            rows.retain(|r| {
                !r.get("email")
                    .and_then(Value::as_str)
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            });
            rows.push(row);
            Ok::<_, AuthError>(())
        })?;
        info!("administrator account claimed");
        Ok(self.admin_user(email))
    }

    fn admin_user(&self, email: &str) -> User {
        User {
            email: email.to_string(),
            name: self.admin.display_name.clone(),
            role: Role::Admin,
            profile_picture: None,
        }
    }
}

impl<K: std::fmt::Debug, B: ?Sized> std::fmt::Debug for AuthService<K, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("query", &self.query)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

/// Role stored in `row`; an unreadable role is treated as GUEST.
fn stored_role(row: &Row) -> Role {
    row.get("role")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(Role::Guest)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_store::{MemoryBlobStore, MemoryKv, RowOrder, StoreError, StoreResult};

    type Service = AuthService<Arc<MemoryKv>, MemoryBlobStore>;

    /// Blob area whose every operation fails.
    struct FailingBlobStore;

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        async fn put(&self, _key: &str, _blob: Blob) -> StoreResult<()> {
            Err(StoreError::Blob("disk full".into()))
        }

        async fn get(&self, _key: &str) -> StoreResult<Option<Blob>> {
            Err(StoreError::Blob("database locked".into()))
        }

        async fn delete(&self, _key: &str) -> StoreResult<bool> {
            Err(StoreError::Blob("database locked".into()))
        }

        async fn keys(&self) -> StoreResult<Vec<String>> {
            Err(StoreError::Blob("database locked".into()))
        }
    }

    fn failing_service() -> (AuthService<Arc<MemoryKv>, FailingBlobStore>, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        let svc = AuthService::new(Arc::clone(&kv), Arc::new(FailingBlobStore))
            .with_admin(AdminCredential::new("owner@site.io", "override", "Owner"));
        (svc, kv)
    }

    fn service() -> (Service, Arc<MemoryKv>, Arc<MemoryBlobStore>) {
        let kv = Arc::new(MemoryKv::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let svc = AuthService::new(Arc::clone(&kv), Arc::clone(&blobs))
            .with_admin(AdminCredential::new("owner@site.io", "override", "Owner"));
        (svc, kv, blobs)
    }

    fn users(kv: &Arc<MemoryKv>) -> Vec<UserRecord> {
        QueryEngine::new(Arc::clone(kv))
            .fetch(Statement::SelectAll { table: Table::Users, order: RowOrder::Insertion })
            .unwrap()
    }

    #[test]
    fn register_then_verify_returns_guest() {
        let (svc, _, _) = service();
        let user = svc.register("ann@x.io", "Ann", "pw").unwrap();
        assert_eq!(user.role, Role::Guest);

        let verified = svc.verify("ann@x.io", "pw").unwrap();
        assert_eq!(verified.name, "Ann");
        assert_eq!(verified.role, Role::Guest);
        assert!(verified.profile_picture.is_none());
    }

    #[test]
    fn duplicate_email_leaves_table_unchanged() {
        let (svc, kv, _) = service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();
        let before = users(&kv);

        let err = svc.register("ann@x.io", "Other", "pw2").unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(users(&kv), before);
    }

    #[test]
    fn duplicate_check_is_case_sensitive() {
        let (svc, kv, _) = service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();
        svc.register("ANN@x.io", "Ann 2", "pw").unwrap();
        assert_eq!(users(&kv).len(), 2);
    }

    #[test]
    fn reserved_email_without_override_is_rejected() {
        let (svc, kv, _) = service();
        let err = svc.register("OWNER@site.io", "Mallory", "guess").unwrap_err();
        assert!(matches!(err, AuthError::ReservedEmail));
        assert!(users(&kv).is_empty());
    }

    #[test]
    fn admin_claim_is_idempotent() {
        let (svc, kv, _) = service();
        svc.register("owner@site.io", "Owner", "override").unwrap();
        svc.register("Owner@Site.io", "Ignored", "override").unwrap();
        let user = svc.register("owner@site.io", "Ignored", "override").unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.name, "Owner");

        let admins: Vec<_> = users(&kv)
            .into_iter()
            .filter(|u| u.email.eq_ignore_ascii_case("owner@site.io"))
            .collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].role, Role::Admin);
    }

    #[test]
    fn admin_claim_replaces_prior_guest_row() {
        let (svc, kv, _) = service();
        // A row planted directly, bypassing register's reserved-email check.
        QueryEngine::new(Arc::clone(&kv))
            .execute(Statement::InsertUser(UserRecord {
                email: "owner@site.io".into(),
                name: "Squatter".into(),
                password: "x".into(),
                role: Role::Guest,
            }))
            .unwrap();

        svc.register("owner@site.io", "Owner", "override").unwrap();
        let rows = users(&kv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role, Role::Admin);
        assert_eq!(rows[0].password, "override");
    }

    #[test]
    fn verify_override_without_row() {
        let (svc, kv, _) = service();
        let user = svc.verify("OWNER@SITE.IO", "override").unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email, "OWNER@SITE.IO");
        assert!(users(&kv).is_empty());
    }

    #[test]
    fn verify_wrong_password_fails() {
        let (svc, _, _) = service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();
        assert!(matches!(
            svc.verify("ann@x.io", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.verify("nobody@x.io", "pw"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn update_profile_renames_and_stores_picture() {
        let (svc, kv, blobs) = service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();

        let picture = Blob::new("image/png", vec![1, 2, 3]);
        let user = svc
            .update_profile("ann@x.io", "Annie", Some(picture.clone()))
            .await
            .unwrap();
        assert_eq!(user.name, "Annie");
        assert_eq!(user.role, Role::Guest);
        assert_eq!(user.profile_picture, Some(picture.to_data_url()));

        assert_eq!(users(&kv)[0].name, "Annie");
        assert_eq!(blobs.get("pfp_ann@x.io").await.unwrap(), Some(picture));
    }

    #[tokio::test]
    async fn update_profile_without_picture_keeps_existing_image() {
        let (svc, _, blobs) = service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();
        let picture = Blob::new("image/gif", vec![7]);
        blobs.put("pfp_ann@x.io", picture.clone()).await.unwrap();

        let user = svc.update_profile("ann@x.io", "Ann", None).await.unwrap();
        assert_eq!(user.profile_picture, Some(picture.to_data_url()));
    }

    #[tokio::test]
    async fn update_profile_unknown_user_fails_without_writing() {
        let (svc, kv, _) = service();
        let err = svc
            .update_profile("ghost@x.io", "Ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn update_profile_creates_missing_admin_row() {
        let (svc, kv, _) = service();
        let user = svc
            .update_profile("owner@site.io", "Boss", None)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Admin);

        let rows = users(&kv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Boss");
        assert_eq!(rows[0].password, "override");
        assert_eq!(rows[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn update_profile_admin_match_is_exact() {
        let (svc, _, _) = service();
        let err = svc
            .update_profile("OWNER@site.io", "Boss", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[test]
    fn change_password_in_place() {
        let (svc, kv, _) = service();
        svc.register("ann@x.io", "Ann", "old").unwrap();
        svc.change_password("ann@x.io", "old", "new").unwrap();

        assert_eq!(users(&kv)[0].password, "new");
        assert!(svc.verify("ann@x.io", "new").is_ok());
        assert!(svc.verify("ann@x.io", "old").is_err());
    }

    #[test]
    fn change_password_errors() {
        let (svc, _, _) = service();
        svc.register("ann@x.io", "Ann", "old").unwrap();
        assert!(matches!(
            svc.change_password("ann@x.io", "wrong", "new"),
            Err(AuthError::InvalidOldPassword)
        ));
        assert!(matches!(
            svc.change_password("ghost@x.io", "old", "new"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn admin_override_password_is_protected() {
        let (svc, kv, _) = service();
        svc.register("owner@site.io", "Owner", "override").unwrap();
        let before = users(&kv);

        let err = svc
            .change_password("owner@site.io", "override", "new")
            .unwrap_err();
        assert!(matches!(err, AuthError::AdminPasswordProtected));
        assert_eq!(users(&kv), before);
    }

    #[tokio::test]
    async fn profile_image_absent_is_none() {
        let (svc, _, _) = service();
        assert!(svc.profile_image("ann@x.io").await.is_none());
    }

    #[tokio::test]
    async fn profile_image_read_failure_is_none() {
        let (svc, _) = failing_service();
        assert!(svc.profile_image("ann@x.io").await.is_none());
    }

    #[tokio::test]
    async fn update_profile_propagates_picture_store_failure() {
        let (svc, kv) = failing_service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();

        let err = svc
            .update_profile("ann@x.io", "Annie", Some(Blob::new("image/png", vec![1])))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::Blob(_))));

        // The rename is committed before the picture is stored.
        let rows = users(&kv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Annie");
        assert_eq!(rows[0].password, "pw");
    }

    #[tokio::test]
    async fn update_profile_without_picture_tolerates_read_failure() {
        let (svc, _) = failing_service();
        svc.register("ann@x.io", "Ann", "pw").unwrap();

        let user = svc.update_profile("ann@x.io", "Annie", None).await.unwrap();
        assert_eq!(user.name, "Annie");
        assert!(user.profile_picture.is_none());
    }
}
