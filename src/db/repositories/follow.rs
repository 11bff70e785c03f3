//! Follow repository
//!
//! Directed follow edges between users. Self-follows are rejected by a CHECK
//! constraint and duplicate edges by the primary key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::{Follow, User};
use crate::with_pool;

const JOINED_USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.role, u.display_name, \
     u.bio, u.avatar_url, u.created_at, u.updated_at";

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create the edge `follower_id -> following_id`
    async fn create(&self, follower_id: i64, following_id: i64) -> Result<Follow>;

    /// Remove an edge. Returns false when there was none.
    async fn delete(&self, follower_id: i64, following_id: i64) -> Result<bool>;

    /// Users following `user_id`, newest edge first
    async fn list_followers(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<User>>;

    async fn count_followers(&self, user_id: i64) -> Result<i64>;

    /// Users `user_id` follows, newest edge first
    async fn list_following(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<User>>;

    async fn count_following(&self, user_id: i64) -> Result<i64>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, follower_id: i64, following_id: i64) -> Result<Follow> {
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Follow>(
                r#"
                INSERT INTO follows (follower_id, following_id, created_at)
                VALUES ($1, $2, $3)
                RETURNING follower_id, following_id, created_at
                "#,
            )
            .bind(follower_id)
            .bind(following_id)
            .bind(Utc::now())
            .fetch_one(conn)
            .await
        })
        .context("Failed to create follow")
    }

    async fn delete(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id)
                .bind(following_id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete follow")?;

        Ok(affected > 0)
    }

    async fn list_followers(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {} FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1
            ORDER BY f.created_at DESC, u.id DESC
            LIMIT $2 OFFSET $3
            "#,
            JOINED_USER_COLUMNS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list followers")
    }

    async fn count_followers(&self, user_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE following_id = $1")
                .bind(user_id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count followers")
    }

    async fn list_following(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {} FROM follows f
            JOIN users u ON u.id = f.following_id
            WHERE f.follower_id = $1
            ORDER BY f.created_at DESC, u.id DESC
            LIMIT $2 OFFSET $3
            "#,
            JOINED_USER_COLUMNS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list followed users")
    }

    async fn count_following(&self, user_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
                .bind(user_id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count followed users")
    }
}
