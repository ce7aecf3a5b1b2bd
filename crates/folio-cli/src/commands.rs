//! Subcommand handlers.
//!
//! Each handler runs against an [`App`], which owns the storage handles and
//! the restored session for this invocation. Publishing and moderation are
//! gated on the ADMIN role here; the services below perform no checks.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use folio_auth::{AuthError, AuthManager};
use folio_store::{
    Blob, BlobStore, BlogPost, Comment, ContentService, Database, Schema, SqliteBlobStore,
    SqliteKv, StoreError, User,
};
use tracing::info;

use crate::cli::{BlobAction, CommentAction, PostAction};
use crate::config::FolioConfig;

// ═══════════════════════════════════════════════════════════════════════
//  Application state
// ═══════════════════════════════════════════════════════════════════════

/// Storage handles and the session for one CLI invocation.
pub struct App {
    auth: AuthManager<Arc<SqliteKv>, SqliteBlobStore>,
    content: ContentService<Arc<SqliteKv>>,
    blobs: Arc<SqliteBlobStore>,
}

impl App {
    /// Open both databases under the configured data directory and restore
    /// the persisted session.
    pub async fn open(config: &FolioConfig) -> Result<Self> {
        let storage = &config.storage;
        std::fs::create_dir_all(&storage.data_dir).with_context(|| {
            format!(
                "failed to create data directory {}",
                storage.data_dir.display()
            )
        })?;

        let tables_path = storage.tables_path();
        let db = Database::open_and_migrate(tables_path.clone(), Schema::Tables)
            .await
            .with_context(|| format!("failed to open {}", tables_path.display()))?;
        let kv = Arc::new(SqliteKv::new(db));

        let blobs_path = storage.blobs_path();
        let blobs = SqliteBlobStore::open(blobs_path.clone())
            .await
            .with_context(|| format!("failed to open {}", blobs_path.display()))?;
        let blobs = Arc::new(blobs);

        let auth = AuthManager::new(Arc::clone(&kv), Arc::clone(&blobs))
            .with_admin(config.admin_credential());
        auth.restore().await;
        info!(
            tables = %tables_path.display(),
            blobs = %blobs_path.display(),
            "storage ready"
        );

        Ok(Self {
            auth,
            content: ContentService::new(kv),
            blobs,
        })
    }

    fn require_user(&self) -> Result<User> {
        Ok(self.auth.current_user().ok_or(AuthError::NotAuthenticated)?)
    }

    fn require_admin(&self) -> Result<User> {
        let user = self.require_user()?;
        if !user.is_admin() {
            bail!("only the site administrator can do that");
        }
        Ok(user)
    }

    fn require_post(&self, id: &str) -> Result<BlogPost> {
        self.content.get_post(id)?.ok_or_else(|| {
            StoreError::NotFound {
                entity: "post",
                id: id.to_string(),
            }
            .into()
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Account commands
// ═══════════════════════════════════════════════════════════════════════

pub fn signup(app: &App, email: &str, name: &str, password: &str) -> Result<()> {
    let user = app.auth.signup(email, name, password)?;
    println!("Welcome, {}! You are logged in as {}.", user.name, user.role);
    Ok(())
}

pub async fn login(app: &App, email: &str, password: &str) -> Result<()> {
    let user = app.auth.login(email, password).await?;
    println!("Logged in as {} <{}> ({}).", user.name, user.email, user.role);
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.auth.logout()?;
    println!("Logged out.");
    Ok(())
}

pub fn whoami(app: &App) {
    match app.auth.current_user() {
        Some(user) => {
            println!("{} <{}> ({})", user.name, user.email, user.role);
            match &user.profile_picture {
                Some(url) => println!("  profile picture: {}", picture_summary(url)),
                None => println!("  profile picture: none"),
            }
        }
        None => println!("Not logged in."),
    }
}

pub async fn profile(app: &App, name: &str, picture: Option<&Path>) -> Result<()> {
    let blob = match picture {
        Some(path) => Some(read_image(path).await?),
        None => None,
    };

    let user = app.auth.update_profile(name, blob).await?;
    println!("Profile updated: {} <{}>", user.name, user.email);
    if let Some(url) = &user.profile_picture {
        println!("  profile picture: {}", picture_summary(url));
    }
    Ok(())
}

pub fn passwd(app: &App, old: &str, new: &str) -> Result<()> {
    app.auth.change_password(old, new)?;
    println!("Password changed.");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Post commands
// ═══════════════════════════════════════════════════════════════════════

pub async fn posts(app: &App, action: PostAction) -> Result<()> {
    match action {
        PostAction::List => {
            let posts = app.content.list_posts()?;
            if posts.is_empty() {
                println!("No posts yet.");
            }
            for post in posts {
                println!(
                    "[{}] {}  ({}, {})",
                    post.id,
                    post.title,
                    post.author,
                    display_time(&post.created_at)
                );
                println!("    {}", post.summary);
            }
        }
        PostAction::Show { id } => {
            let post = app.require_post(&id)?;
            println!("{}", post.title);
            println!("by {} on {}", post.author, display_time(&post.created_at));
            if !post.image_url.is_empty() {
                println!("image: {}", picture_summary(&post.image_url));
            }
            println!();
            for paragraph in post.paragraphs() {
                println!("{paragraph}");
                println!();
            }
            print_comments(&app.content.list_comments(&post.id)?);
        }
        PostAction::Create {
            title,
            content,
            summary,
            image_url,
            image,
        } => {
            let author = app.require_admin()?;
            if title.trim().is_empty() || content.trim().is_empty() {
                bail!("a post needs both a title and content");
            }
            let image_url = match image {
                Some(path) => Some(read_image(&path).await?.to_data_url()),
                None => image_url,
            };
            let post = BlogPost::new(title, content, summary, author.name, image_url);
            app.content.save_post(&post)?;
            println!("Published post {}.", post.id);
        }
        PostAction::Delete { id } => {
            app.require_admin()?;
            app.content.delete_post(&id)?;
            println!("Deleted post {id}.");
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Comment commands
// ═══════════════════════════════════════════════════════════════════════

pub fn comments(app: &App, action: CommentAction) -> Result<()> {
    match action {
        CommentAction::List { post_id } => {
            print_comments(&app.content.list_comments(&post_id)?);
        }
        CommentAction::Add { post_id, content } => {
            let user = app.require_user()?;
            if content.trim().is_empty() {
                bail!("comment text is empty");
            }
            let post = app.require_post(&post_id)?;
            let comment = Comment::new(post.id, &user, content);
            app.content.add_comment(&comment)?;
            println!("Comment {} added.", comment.id);
        }
        CommentAction::Delete { id } => {
            app.require_admin()?;
            app.content.delete_comment(&id)?;
            println!("Deleted comment {id}.");
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Blob maintenance
// ═══════════════════════════════════════════════════════════════════════

pub async fn blobs(app: &App, action: BlobAction) -> Result<()> {
    app.require_admin()?;
    match action {
        BlobAction::List => {
            let keys = app.blobs.keys().await?;
            if keys.is_empty() {
                println!("No stored blobs.");
            }
            for key in keys {
                println!("{key}");
            }
        }
        BlobAction::Rm { key } => {
            if app.blobs.delete(&key).await? {
                info!(%key, "blob removed");
                println!("Removed {key}.");
            } else {
                println!("Nothing stored under {key}.");
            }
        }
    }
    Ok(())
}

fn print_comments(comments: &[Comment]) {
    println!("Comments ({})", comments.len());
    for c in comments {
        println!(
            "  [{}] {} <{}> on {}",
            c.id,
            c.user_name,
            c.user_email,
            display_time(&c.created_at)
        );
        println!("      {}", c.content);
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════

/// Read an image file into a [`Blob`] typed by its extension.
async fn read_image(path: &Path) -> Result<Blob> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Blob::new(content_type_for(path), data))
}

/// Media type for an image file, judged by its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => folio_store::blob::DEFAULT_CONTENT_TYPE,
    }
}

/// `createdAt` as `YYYY-MM-DD HH:MM UTC`, or verbatim if it does not parse.
fn display_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Short form of an image URL; inline `data:` URLs are reduced to their
/// media type and size.
fn picture_summary(url: &str) -> String {
    match url.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, payload)) => {
            let media = meta.split(';').next().unwrap_or_default();
            format!("{media}, {} base64 chars", payload.len())
        }
        None => url.to_string(),
    }
}

// ── tests ────────────────────────────────────────────────────────────
