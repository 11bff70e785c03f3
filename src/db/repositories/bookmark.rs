//! Bookmark repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::content::content_columns;
use crate::db::DynDatabasePool;
use crate::models::{Bookmark, Content};
use crate::with_pool;

/// Bookmark repository trait
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Save a content item for a user. Duplicates fail with a unique violation.
    async fn create(&self, user_id: i64, content_id: i64) -> Result<Bookmark>;

    /// Remove a bookmark. Returns false when there was none.
    async fn delete(&self, user_id: i64, content_id: i64) -> Result<bool>;

    /// Bookmarked contents that are still visible, most recent bookmark first
    async fn list_contents(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>>;

    async fn count(&self, user_id: i64) -> Result<i64>;
}

pub struct SqlxBookmarkRepository {
    pool: DynDatabasePool,
}

impl SqlxBookmarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookmarkRepository> {
        Arc::new(Self::new(pool))
    }
}

// A bookmark stays listed while the content is published or owned by the user
const VISIBLE_BOOKMARKS: &str = r#"
    FROM bookmarks b
    JOIN contents c ON c.id = b.content_id
    WHERE b.user_id = $1 AND (c.status = 'published' OR c.author_id = $1)
"#;

#[async_trait]
impl BookmarkRepository for SqlxBookmarkRepository {
    async fn create(&self, user_id: i64, content_id: i64) -> Result<Bookmark> {
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Bookmark>(
                r#"
                INSERT INTO bookmarks (user_id, content_id, created_at)
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
        .context("Failed to create bookmark")
    }

    async fn delete(&self, user_id: i64, content_id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND content_id = $2")
                .bind(user_id)
                .bind(content_id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete bookmark")?;

        Ok(affected > 0)
    }

    async fn list_contents(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>> {
        let sql = format!(
            "SELECT {} {} ORDER BY b.created_at DESC, b.id DESC LIMIT $2 OFFSET $3",
            content_columns(Some("c")),
            VISIBLE_BOOKMARKS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list bookmarks")
    }

    async fn count(&self, user_id: i64) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) {}", VISIBLE_BOOKMARKS);
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(user_id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count bookmarks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::content::tests::{article, seeded_pool};
    use crate::db::repositories::{ContentRepository, SqlxContentRepository};
    use crate::db::{constraint_violation, ConstraintViolation};

    #[tokio::test]
    async fn test_bookmark_lifecycle() {
        let (pool, user_id, category_id) = seeded_pool().await;
        let contents = SqlxContentRepository::new(pool.clone());
        // Own drafts stay visible in the author's bookmarks
        let content = contents
            .create(&article(user_id, category_id, "Saved", "saved"))
            .await
            .unwrap();
        let repo = SqlxBookmarkRepository::new(pool);

        let bookmark = repo.create(user_id, content.id).await.unwrap();
        assert_eq!(bookmark.user_id, user_id);

        let err = repo.create(user_id, content.id).await.unwrap_err();
        assert_eq!(constraint_violation(&err), Some(ConstraintViolation::Unique));

        assert_eq!(repo.count(user_id).await.unwrap(), 1);
        let listed = repo.list_contents(user_id, 10, 0).await.unwrap();
        assert_eq!(listed[0].id, content.id);

        assert!(repo.delete(user_id, content.id).await.unwrap());
        assert!(!repo.delete(user_id, content.id).await.unwrap());
        assert_eq!(repo.count(user_id).await.unwrap(), 0);
    }
}
