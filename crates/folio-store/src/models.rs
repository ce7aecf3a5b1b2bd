//! Domain records persisted in the key-value tables.
//!
//! JSON field names match the stored snapshot layout (`createdAt`,
//! `imageUrl`, `postId`, ...), so records written by one version can be
//! read by the next.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Number of content characters used for a derived summary.
pub const SUMMARY_CHARS: usize = 100;

// ═══════════════════════════════════════════════════════════════════════
//  Users
// ═══════════════════════════════════════════════════════════════════════

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regular reader: may comment.
    Guest,
    /// Site owner: may publish and moderate.
    Admin,
}

impl Role {
    /// The stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "GUEST",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `users` table, including the plaintext password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

impl UserRecord {
    /// The public identity of this record, without an image.
    pub fn to_user(&self) -> User {
        User {
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            profile_picture: None,
        }
    }
}

/// A logged-in identity as seen by callers. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Display URL of the profile image, rehydrated from the blob area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl User {
    /// Whether this user may publish posts and moderate comments.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The persisted subset of a [`User`]: no password, no image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

impl Session {
    /// Turn the session back into a user, attaching `profile_picture`.
    pub fn into_user(self, profile_picture: Option<String>) -> User {
        User {
            email: self.email,
            name: self.name,
            role: self.role,
            profile_picture,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Posts and comments
// ═══════════════════════════════════════════════════════════════════════

/// A published blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    /// Free text; paragraphs are separated by `\n`.
    pub content: String,
    pub summary: String,
    /// Author name at the time of publishing.
    pub author: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// Inline `data:` URL or external URL; empty when the post has no image.
    #[serde(default)]
    pub image_url: String,
}

impl BlogPost {
    /// Build a new post stamped with the current time.
    ///
    /// An empty or missing `summary` is derived from the content.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        summary: Option<String>,
        author: impl Into<String>,
        image_url: Option<String>,
    ) -> Self {
        let content = content.into();
        let summary = match summary {
            Some(s) if !s.is_empty() => s,
            _ => derive_summary(&content),
        };
        Self {
            id: timestamp_id(),
            title: title.into(),
            content,
            summary,
            author: author.into(),
            created_at: now_rfc3339(),
            image_url: image_url.unwrap_or_default(),
        }
    }

    /// Content split into paragraphs, skipping blank lines.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n').filter(|p| !p.trim().is_empty())
    }
}

/// A reader comment attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    /// Id of the post; not checked against the posts table.
    pub post_id: String,
    pub user_name: String,
    pub user_email: String,
    pub content: String,
    pub created_at: String,
}

impl Comment {
    /// Build a new comment by `author` on `post_id`, stamped with the current time.
    pub fn new(post_id: impl Into<String>, author: &User, content: impl Into<String>) -> Self {
        Self {
            id: timestamp_id(),
            post_id: post_id.into(),
            user_name: author.name.clone(),
            user_email: author.email.clone(),
            content: content.into(),
            created_at: now_rfc3339(),
        }
    }
}

/// First [`SUMMARY_CHARS`] characters of `content` followed by `...`.
pub fn derive_summary(content: &str) -> String {
    let head: String = content.chars().take(SUMMARY_CHARS).collect();
    format!("{head}...")
}

/// Record id derived from the current Unix time in milliseconds.
pub fn timestamp_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Current time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── tests ────────────────────────────────────────────────────────────
