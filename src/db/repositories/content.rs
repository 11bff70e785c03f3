//! Content repository
//!
//! Database operations for content items, including relevance search.
//!
//! This module provides:
//! - `ContentRepository` trait defining the interface for content data access
//! - `SqlxContentRepository` implementing the trait for SQLite and PostgreSQL
//!
//! Search runs inside the database. On PostgreSQL the `search_contents`
//! function does the ranking; on SQLite the same score is assembled from
//! `LIKE` matches.

use crate::db::DynDatabasePool;
use crate::models::{Content, ContentFilter, ContentStatus, SearchHit};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

const CONTENT_FIELDS: [&str; 15] = [
    "id",
    "author_id",
    "category_id",
    "title",
    "slug",
    "description",
    "body",
    "content_type",
    "media_url",
    "duration_seconds",
    "status",
    "view_count",
    "published_at",
    "created_at",
    "updated_at",
];

/// Content column list, optionally qualified with a table alias.
///
/// Columns are always listed explicitly: the PostgreSQL `search_vector`
/// column is not decodable into `Content`.
pub(crate) fn content_columns(alias: Option<&str>) -> String {
    CONTENT_FIELDS
        .iter()
        .map(|field| match alias {
            Some(alias) => format!("{}.{}", alias, field),
            None => (*field).to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape `LIKE` wildcards and wrap the term for a substring match
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Content repository trait
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a content item
    async fn create(&self, content: &Content) -> Result<Content>;

    /// Get content by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Content>>;

    /// Check if a slug is taken
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Update editable fields (title, category, description, body, media)
    async fn update(&self, content: &Content) -> Result<Option<Content>>;

    /// Move to `status`. `published_at` is filled with `now` only if it was
    /// never set and the new status is `published`.
    async fn update_status(
        &self,
        id: i64,
        status: ContentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Content>>;

    /// Count a view on published content
    async fn increment_views(&self, id: i64) -> Result<()>;

    /// Delete content. Returns false when no row matched.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List published content, newest first
    async fn list_published(
        &self,
        filter: &ContentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Content>>;

    /// Count published content matching the filter
    async fn count_published(&self, filter: &ContentFilter) -> Result<i64>;

    /// List all content of an author regardless of status, newest first
    async fn list_by_author(&self, author_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>>;

    /// Count all content of an author
    async fn count_by_author(&self, author_id: i64) -> Result<i64>;

    /// Relevance-ranked search over published content
    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>>;

    /// Number of published items matching a search
    async fn count_search(&self, query: &str) -> Result<i64>;
}

/// SQLx-based content repository implementation
///
/// Supports both SQLite and PostgreSQL databases.
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    /// Create a new SQLx content repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

const PUBLISHED_FILTER: &str = r#"
    c.status = 'published'
    AND ($1 IS NULL OR c.category_id = $1)
    AND ($2 IS NULL OR c.author_id = $2)
    AND ($3 IS NULL OR c.content_type = $3)
"#;

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, content: &Content) -> Result<Content> {
        let sql = format!(
            r#"
            INSERT INTO contents (author_id, category_id, title, slug, description, body, content_type,
                                  media_url, duration_seconds, status, view_count, published_at,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, $11, $12, $12)
            RETURNING {}
            "#,
            content_columns(None)
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(content.author_id)
                .bind(content.category_id)
                .bind(&content.title)
                .bind(&content.slug)
                .bind(&content.description)
                .bind(&content.body)
                .bind(content.content_type.as_str())
                .bind(&content.media_url)
                .bind(content.duration_seconds)
                .bind(content.status.as_str())
                .bind(content.published_at)
                .bind(Utc::now())
                .fetch_one(conn)
                .await
        })
        .context("Failed to create content")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Content>> {
        let sql = format!("SELECT {} FROM contents WHERE id = $1", content_columns(None));
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql).bind(id).fetch_optional(conn).await
        })
        .context("Failed to get content by ID")
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contents WHERE slug = $1")
                .bind(slug)
                .fetch_one(conn)
                .await
        })
        .map(|count| count > 0)
        .context("Failed to check content slug")
    }

    async fn update(&self, content: &Content) -> Result<Option<Content>> {
        let sql = format!(
            r#"
            UPDATE contents
            SET title = $1, category_id = $2, description = $3, body = $4, media_url = $5,
                duration_seconds = $6, updated_at = $7
            WHERE id = $8
            RETURNING {}
            "#,
            content_columns(None)
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(&content.title)
                .bind(content.category_id)
                .bind(&content.description)
                .bind(&content.body)
                .bind(&content.media_url)
                .bind(content.duration_seconds)
                .bind(Utc::now())
                .bind(content.id)
                .fetch_optional(conn)
                .await
        })
        .context("Failed to update content")
    }

    async fn update_status(
        &self,
        id: i64,
        status: ContentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Content>> {
        let sql = format!(
            r#"
            UPDATE contents
            SET status = $1,
                published_at = COALESCE(published_at, CASE WHEN $1 = 'published' THEN $2 END),
                updated_at = $2
            WHERE id = $3
            RETURNING {}
            "#,
            content_columns(None)
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .fetch_optional(conn)
                .await
        })
        .context("Failed to update content status")
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |conn| {
            sqlx::query(
                "UPDATE contents SET view_count = view_count + 1 WHERE id = $1 AND status = 'published'",
            )
            .bind(id)
            .execute(conn)
            .await
            .map(|_| ())
        })
        .context("Failed to increment view count")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM contents WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete content")?;

        Ok(affected > 0)
    }

    async fn list_published(
        &self,
        filter: &ContentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Content>> {
        let sql = format!(
            r#"
            SELECT {} FROM contents c
            WHERE {}
            ORDER BY c.published_at DESC, c.id DESC
            LIMIT $4 OFFSET $5
            "#,
            content_columns(Some("c")),
            PUBLISHED_FILTER
        );
        let content_type = filter.content_type.map(|t| t.as_str());

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(filter.category_id)
                .bind(filter.author_id)
                .bind(content_type)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list published content")
    }

    async fn count_published(&self, filter: &ContentFilter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM contents c WHERE {}", PUBLISHED_FILTER);
        let content_type = filter.content_type.map(|t| t.as_str());

        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(filter.category_id)
                .bind(filter.author_id)
                .bind(content_type)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count published content")
    }

    async fn list_by_author(&self, author_id: i64, limit: i64, offset: i64) -> Result<Vec<Content>> {
        let sql = format!(
            r#"
            SELECT {} FROM contents
            WHERE author_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            content_columns(None)
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Content>(&sql)
                .bind(author_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list content by author")
    }

    async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contents WHERE author_id = $1")
                .bind(author_id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count content by author")
    }

    async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>> {
        if let Some(pool) = self.pool.as_postgres() {
            let sql = format!(
                r#"
                SELECT {}, s.score
                FROM search_contents($1, $2, $3) s
                JOIN contents c ON c.id = s.content_id
                ORDER BY s.score DESC, c.published_at DESC, c.id DESC
                "#,
                content_columns(Some("c"))
            );
            return sqlx::query_as::<_, SearchHit>(&sql)
                .bind(query)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
                .context("Failed to search content");
        }

        let pool = self
            .pool
            .as_sqlite()
            .ok_or_else(|| anyhow::anyhow!("No database pool available"))?;
        let sql = format!(
            r#"
            SELECT {},
                (CASE WHEN lower(c.title) = lower($1) THEN 1.0
                      WHEN c.title LIKE $2 ESCAPE '\' THEN 0.5
                      ELSE 0.0 END
                 + CASE WHEN c.description LIKE $2 ESCAPE '\' THEN 0.1 ELSE 0.0 END
                 + CASE WHEN c.body LIKE $2 ESCAPE '\' THEN 0.05 ELSE 0.0 END
                 + CASE WHEN c.view_count >= 10000 THEN 0.3
                        WHEN c.view_count >= 1000 THEN 0.2
                        WHEN c.view_count >= 100 THEN 0.1
                        ELSE 0.0 END
                 + CASE WHEN c.published_at >= $3 THEN 0.3
                        WHEN c.published_at >= $4 THEN 0.15
                        WHEN c.published_at >= $5 THEN 0.05
                        ELSE 0.0 END) AS score
            FROM contents c
            WHERE c.status = 'published'
              AND (c.title LIKE $2 ESCAPE '\' OR c.description LIKE $2 ESCAPE '\' OR c.body LIKE $2 ESCAPE '\')
            ORDER BY score DESC, c.published_at DESC, c.id DESC
            LIMIT $6 OFFSET $7
            "#,
            content_columns(Some("c"))
        );

        sqlx::query_as::<_, SearchHit>(&sql)
            .bind(query)
            .bind(like_pattern(query))
            .bind(now - Duration::days(7))
            .bind(now - Duration::days(30))
            .bind(now - Duration::days(365))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
            .context("Failed to search content")
    }

    async fn count_search(&self, query: &str) -> Result<i64> {
        if let Some(pool) = self.pool.as_postgres() {
            return sqlx::query_scalar::<_, i64>("SELECT search_contents_count($1)")
                .bind(query)
                .fetch_one(pool)
                .await
                .context("Failed to count search results");
        }

        let pool = self
            .pool
            .as_sqlite()
            .ok_or_else(|| anyhow::anyhow!("No database pool available"))?;
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM contents c
            WHERE c.status = 'published'
              AND (c.title LIKE $1 ESCAPE '\' OR c.description LIKE $1 ESCAPE '\' OR c.body LIKE $1 ESCAPE '\')
            "#,
        )
        .bind(like_pattern(query))
        .fetch_one(pool)
        .await
        .context("Failed to count search results")
    }
}
