//! CLI argument definitions for Folio.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Folio -- a personal blog with reader accounts.
#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Folio -- personal blog with reader accounts",
    long_about = "Publish posts, manage your profile, and moderate comments. \
                  Everything is stored locally under the configured data directory."
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(
        long,
        global = true,
        env = "FOLIO_CONFIG",
        default_value = "config/default.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and log in.
    Signup {
        #[arg(long)]
        email: String,
        /// Display name.
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },

    /// Log in to an existing account.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Log out.
    Logout,

    /// Show who is logged in.
    Whoami,

    /// Change your display name and profile picture.
    Profile {
        /// New display name.
        #[arg(long)]
        name: String,
        /// Image file to use as the profile picture.
        #[arg(long)]
        picture: Option<PathBuf>,
    },

    /// Change your password.
    Passwd {
        /// Current password.
        #[arg(long)]
        old: String,
        /// New password.
        #[arg(long)]
        new: String,
    },

    /// Read and manage blog posts.
    Posts {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Read and manage comments.
    Comments {
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Inspect and prune stored profile images (administrator only).
    Blobs {
        #[command(subcommand)]
        action: BlobAction,
    },
}

/// Actions on blog posts.
#[derive(Subcommand)]
pub enum PostAction {
    /// List all posts, newest first.
    List,
    /// Show one post with its comments.
    Show {
        /// Post id.
        id: String,
    },
    /// Publish a new post (administrator only).
    Create {
        #[arg(long)]
        title: String,
        /// Post body; separate paragraphs with newlines.
        #[arg(long)]
        content: String,
        /// Short summary. Derived from the content when omitted.
        #[arg(long)]
        summary: Option<String>,
        /// Cover image URL.
        #[arg(long, conflicts_with = "image")]
        image_url: Option<String>,
        /// Local image file, embedded in the post as an inline data URL.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete a post (administrator only). Its comments are kept.
    Delete {
        /// Post id.
        id: String,
    },
}

/// Actions on comments.
#[derive(Subcommand)]
pub enum CommentAction {
    /// List comments on a post, newest first.
    List {
        /// Post id.
        post_id: String,
    },
    /// Comment on a post (requires login).
    Add {
        /// Post id.
        post_id: String,
        #[arg(long)]
        content: String,
    },
    /// Delete a comment (administrator only).
    Delete {
        /// Comment id.
        id: String,
    },
}

/// Maintenance actions on the blob area.
#[derive(Subcommand)]
pub enum BlobAction {
    /// List stored keys.
    List,
    /// Remove the payload stored under a key.
    Rm {
        /// Blob key, e.g. `pfp_<email>`.
        key: String,
    },
}
