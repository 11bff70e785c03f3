//! Rating repository
//!
//! A rating is a single "like" from a user on a content item. The
//! `(user_id, content_id)` pair is unique in the schema.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::content::content_columns;
use crate::db::DynDatabasePool;
use crate::models::{Content, Rating};
use crate::with_pool;

/// Rating repository trait
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Record a like. Fails with a unique violation when it already exists.
    async fn create(&self, user_id: i64, content_id: i64) -> Result<Rating>;

    /// Remove a like. Returns false when there was none.
    async fn delete(&self, user_id: i64, content_id: i64) -> Result<bool>;

    /// Check whether a user likes a content item
    async fn exists(&self, user_id: i64, content_id: i64) -> Result<bool>;

    /// Number of likes on a content item
    async fn count_for_content(&self, content_id: i64) -> Result<i64>;

    /// Published contents liked by a user, most recently liked first
    async fn list_liked(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>>;

    /// Number of published contents liked by a user
    async fn count_liked(&self, user_id: i64) -> Result<i64>;
}

pub struct SqlxRatingRepository {
    pool: DynDatabasePool,
}

impl SqlxRatingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RatingRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RatingRepository for SqlxRatingRepository {
    async fn create(&self, user_id: i64, content_id: i64) -> Result<Rating> {
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Rating>(
                r#"
                INSERT INTO ratings (user_id, content_id, created_at)
                VALUES ($1, $2, $3)
                RETURNING id, user_id, content_id, created_at
                "#,
            )
            .bind(user_id)
            .bind(content_id)
            .bind(Utc::now())
            .fetch_one(conn)
            .await
        })
        .context("Failed to create rating")
    }

    async fn delete(&self, user_id: i64, content_id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM ratings WHERE user_id = $1 AND content_id = $2")
                .bind(user_id)
                .bind(content_id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete rating")?;

        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, content_id: i64) -> Result<bool> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM ratings WHERE user_id = $1 AND content_id = $2",
            )
            .bind(user_id)
            .bind(content_id)
            .fetch_one(conn)
            .await
        })
        .map(|count| count > 0)
        .context("Failed to check rating")
    }

    async fn count_for_content(&self, content_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ratings WHERE content_id = $1")
                .bind(content_id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count ratings")
    }

    async fn list_liked(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>> {
        let sql = format!(
            r#"
            SELECT {} FROM ratings r
            JOIN contents c ON c.id = r.content_id
            WHERE r.user_id = $1 AND c.status = 'published'
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            "#,
            content_columns(Some("c"))
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list liked contents")
    }

    async fn count_liked(&self, user_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM ratings r
                JOIN contents c ON c.id = r.content_id
                WHERE r.user_id = $1 AND c.status = 'published'
                "#,
            )
            .bind(user_id)
            .fetch_one(conn)
            .await
        })
        .context("Failed to count liked contents")
    }
}
