//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::Comment;
use crate::with_pool;

const COMMENT_COLUMNS: &str = "id, content_id, user_id, parent_id, body, created_at, updated_at";

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(
        &self,
        content_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// All comments of a content item, oldest first
    async fn list_by_content(&self, content_id: i64) -> Result<Vec<Comment>>;

    /// Replace the body of a comment
    async fn update_body(&self, id: i64, body: &str) -> Result<Option<Comment>>;

    /// Delete a comment; replies go with it
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of comments on a content item
    async fn count_by_content(&self, content_id: i64) -> Result<i64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(
        &self,
        content_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<Comment> {
        let sql = format!(
            r#"
            INSERT INTO comments (content_id, user_id, parent_id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(content_id)
                .bind(user_id)
                .bind(parent_id)
                .bind(body)
                .bind(Utc::now())
                .fetch_one(conn)
                .await
        })
        .context("Failed to create comment")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS);
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_optional(conn).await
        })
        .context("Failed to get comment")
    }

    async fn list_by_content(&self, content_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE content_id = $1 ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(content_id)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list comments")
    }

    async fn update_body(&self, id: i64, body: &str) -> Result<Option<Comment>> {
        let sql = format!(
            "UPDATE comments SET body = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
            COMMENT_COLUMNS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(body)
                .bind(Utc::now())
                .bind(id)
                .fetch_optional(conn)
                .await
        })
        .context("Failed to update comment")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM comments WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete comment")?;

        Ok(affected > 0)
    }

    async fn count_by_content(&self, content_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE content_id = $1")
                .bind(content_id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count comments")
    }
}
