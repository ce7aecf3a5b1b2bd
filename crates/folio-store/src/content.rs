//! Posts and comments.
//!
//! [`ContentService`] runs plain CRUD over the `posts` and `comments` tables.
//! It checks no permissions and does not cascade: deleting a post leaves its
//! comments in place. Callers gate publishing and moderation on the
//! user's role.

use tracing::{debug, instrument};

use crate::error::StoreResult;
use crate::kv::KvBackend;
use crate::models::{BlogPost, Comment};
use crate::query::{QueryEngine, RowOrder, Statement};
use crate::table::Table;

/// CRUD operations on blog posts and their comments.
#[derive(Debug, Clone)]
pub struct ContentService<K> {
    query: QueryEngine<K>,
}

impl<K: KvBackend> ContentService<K> {
    /// Create a content service over `kv`.
    pub fn new(kv: K) -> Self {
        Self {
            query: QueryEngine::new(kv),
        }
    }

    /// All posts, newest first.
    #[instrument(skip(self))]
    pub fn list_posts(&self) -> StoreResult<Vec<BlogPost>> {
        self.query.fetch(Statement::SelectAll {
            table: Table::Posts,
            order: RowOrder::CreatedAtDesc,
        })
    }

    /// The post with `id`, if any.
    #[instrument(skip(self))]
    pub fn get_post(&self, id: &str) -> StoreResult<Option<BlogPost>> {
        let posts: Vec<BlogPost> = self.query.fetch(Statement::SelectById {
            table: Table::Posts,
            id: id.to_string(),
        })?;
        Ok(posts.into_iter().next())
    }

    /// Append `post` to the posts table.
    #[instrument(skip(self, post), fields(id = %post.id))]
    pub fn save_post(&self, post: &BlogPost) -> StoreResult<()> {
        self.query.execute(Statement::InsertPost(post.clone()))?;
        debug!("post saved");
        Ok(())
    }

    /// Remove the post with `id`. Its comments are kept.
    #[instrument(skip(self))]
    pub fn delete_post(&self, id: &str) -> StoreResult<()> {
        self.query.execute(Statement::DeleteById {
            table: Table::Posts,
            id: id.to_string(),
        })?;
        Ok(())
    }

    /// Comments on `post_id`, newest first.
    #[instrument(skip(self))]
    pub fn list_comments(&self, post_id: &str) -> StoreResult<Vec<Comment>> {
        self.query.fetch(Statement::SelectByPostId {
            post_id: post_id.to_string(),
            order: RowOrder::CreatedAtDesc,
        })
    }

    /// Append `comment` to the comments table.
    #[instrument(skip(self, comment), fields(id = %comment.id, post_id = %comment.post_id))]
    pub fn add_comment(&self, comment: &Comment) -> StoreResult<()> {
        self.query.execute(Statement::InsertComment(comment.clone()))?;
        debug!("comment added");
        Ok(())
    }

    /// Remove the comment with `id`.
    #[instrument(skip(self))]
    pub fn delete_comment(&self, id: &str) -> StoreResult<()> {
        self.query.execute(Statement::DeleteById {
            table: Table::Comments,
            id: id.to_string(),
        })?;
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
