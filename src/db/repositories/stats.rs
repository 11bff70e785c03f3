//! Statistics repository
//!
//! Reads the statistics read-models (`content_like_stats`,
//! `user_follow_stats`, `following_feed`). On PostgreSQL they are
//! materialized views and only change on [`StatsRepository::refresh`]; on
//! SQLite they are plain views and always current.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::content::content_columns;
use crate::db::DynDatabasePool;
use crate::models::{Content, EngagementRow, UserStats};
use crate::with_pool;

/// Views refreshed by [`StatsRepository::refresh`]
pub const STATS_VIEWS: [&str; 3] = ["content_like_stats", "user_follow_stats", "following_feed"];

/// Statistics repository trait
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Published contents since `since`, with like and comment counts,
    /// newest first and capped at `limit` rows
    async fn engagement_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<EngagementRow>>;

    /// Published contents by authors `follower_id` follows, newest first
    async fn feed(&self, follower_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>>;

    async fn count_feed(&self, follower_id: i64) -> Result<i64>;

    /// Follower counts of a user, if the read-model has a row for them
    async fn user_stats(&self, user_id: i64) -> Result<Option<UserStats>>;

    /// Recompute the read-models
    async fn refresh(&self) -> Result<()>;
}

pub struct SqlxStatsRepository {
    pool: DynDatabasePool,
}

impl SqlxStatsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StatsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StatsRepository for SqlxStatsRepository {
    async fn engagement_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<EngagementRow>> {
        let sql = format!(
            r#"
            SELECT {},
                   COALESCE(ls.like_count, 0) AS like_count,
                   (SELECT COUNT(*) FROM comments cm WHERE cm.content_id = c.id) AS comment_count
            FROM contents c
            LEFT JOIN content_like_stats ls ON ls.content_id = c.id
            WHERE c.status = 'published' AND c.published_at >= $1
            ORDER BY c.published_at DESC, c.id DESC
            LIMIT $2
            "#,
            content_columns(Some("c"))
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, EngagementRow>(&sql)
                .bind(since)
                .bind(limit)
                .fetch_all(conn)
                .await
        })
        .context("Failed to load trending candidates")
    }

    async fn feed(&self, follower_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>> {
        let sql = format!(
            r#"
            SELECT {} FROM following_feed ff
            JOIN contents c ON c.id = ff.content_id
            WHERE ff.follower_id = $1 AND c.status = 'published'
            ORDER BY c.published_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
            content_columns(Some("c"))
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(follower_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to load feed")
    }

    async fn count_feed(&self, follower_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM following_feed ff
                JOIN contents c ON c.id = ff.content_id
                WHERE ff.follower_id = $1 AND c.status = 'published'
                "#,
            )
            .bind(follower_id)
            .fetch_one(conn)
            .await
        })
        .context("Failed to count feed")
    }

    async fn user_stats(&self, user_id: i64) -> Result<Option<UserStats>> {
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, UserStats>(
                "SELECT user_id, follower_count, following_count FROM user_follow_stats WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(conn)
            .await
        })
        .context("Failed to load user stats")
    }

    async fn refresh(&self) -> Result<()> {
        let Some(pool) = self.pool.as_postgres() else {
            tracing::debug!("Statistics views are live on this backend; nothing to refresh");
            return Ok(());
        };

        for view in STATS_VIEWS {
            sqlx::query(&format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {}", view))
                .execute(pool)
                .await
                .with_context(|| format!("Failed to refresh {}", view))?;
        }
        tracing::debug!("Refreshed {} statistics views", STATS_VIEWS.len());
        Ok(())
    }
}
