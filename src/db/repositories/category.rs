//! Category repository
//!
//! Database operations for categories.
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and PostgreSQL

use crate::db::DynDatabasePool;
use crate::models::Category;
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, created_at, updated_at";

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List all categories (flat list, ordered by name)
    async fn list(&self) -> Result<Vec<Category>>;

    /// Update a category
    async fn update(&self, category: &Category) -> Result<Option<Category>>;

    /// Delete a category. Returns false when no row matched.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a category name already exists
    async fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// Check if a category slug already exists
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Number of contents filed under the category
    async fn count_contents(&self, id: i64) -> Result<i64>;
}

/// SQLx-based category repository implementation
///
/// Supports both SQLite and PostgreSQL databases.
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let sql = format!(
            r#"
            INSERT INTO categories (name, slug, description, parent_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql)
                .bind(&category.name)
                .bind(&category.slug)
                .bind(&category.description)
                .bind(category.parent_id)
                .bind(Utc::now())
                .fetch_one(conn)
                .await
        })
        .context("Failed to create category")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql).bind(id).fetch_optional(conn).await
        })
        .context("Failed to get category by ID")
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE slug = $1", CATEGORY_COLUMNS);
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql).bind(slug).fetch_optional(conn).await
        })
        .context("Failed to get category by slug")
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {} FROM categories ORDER BY name, id", CATEGORY_COLUMNS);
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql).fetch_all(conn).await
        })
        .context("Failed to list categories")
    }

    async fn update(&self, category: &Category) -> Result<Option<Category>> {
        let sql = format!(
            r#"
            UPDATE categories
            SET name = $1, slug = $2, description = $3, parent_id = $4, updated_at = $5
            WHERE id = $6
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, Category>(&sql)
                .bind(&category.name)
                .bind(&category.slug)
                .bind(&category.description)
                .bind(category.parent_id)
                .bind(Utc::now())
                .bind(category.id)
                .fetch_optional(conn)
                .await
        })
        .context("Failed to update category")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM categories WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete category")?;

        Ok(affected > 0)
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE name = $1")
                .bind(name)
                .fetch_one(conn)
                .await
        })
        .map(|count| count > 0)
        .context("Failed to check category name")
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE slug = $1")
                .bind(slug)
                .fetch_one(conn)
                .await
        })
        .map(|count| count > 0)
        .context("Failed to check category slug")
    }

    async fn count_contents(&self, id: i64) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contents WHERE category_id = $1")
                .bind(id)
                .fetch_one(conn)
                .await
        })
        .context("Failed to count category contents")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{constraint_violation, create_test_pool, migrations, ConstraintViolation};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    fn new_category(name: &str, slug: &str, parent_id: Option<i64>) -> Category {
        Category {
            id: 0,
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_category() {
        let repo = setup_test_repo().await;
        let created = repo.create(&new_category("Music", "music", None)).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Music");
        let by_slug = repo.get_by_slug("music").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);

        assert!(repo.exists_by_name("Music").await.unwrap());
        assert!(repo.exists_by_slug("music").await.unwrap());
        assert!(!repo.exists_by_slug("film").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&new_category("Music", "music", None)).await.unwrap();
        let err = repo.create(&new_category("Other", "music", None)).await.unwrap_err();
        assert_eq!(constraint_violation(&err), Some(ConstraintViolation::Unique));
    }

    #[tokio::test]
    async fn test_delete_parent_orphans_children() {
        let repo = setup_test_repo().await;
        let parent = repo.create(&new_category("Parent", "parent", None)).await.unwrap();
        let child = repo
            .create(&new_category("Child", "child", Some(parent.id)))
            .await
            .unwrap();

        assert!(repo.delete(parent.id).await.unwrap());
        let child = repo.get_by_id(child.id).await.unwrap().unwrap();
        assert!(child.is_root());
        assert!(!repo.delete(parent.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_category() {
        let repo = setup_test_repo().await;
        let mut category = repo.create(&new_category("Film", "film", None)).await.unwrap();
        category.description = Some("Moving pictures".to_string());

        let updated = repo.update(&category).await.unwrap().unwrap();
        assert_eq!(updated.description.as_deref(), Some("Moving pictures"));

        category.id = 9999;
        assert!(repo.update(&category).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_count_contents() {
        let repo = setup_test_repo().await;
        let b = repo.create(&new_category("Books", "books", None)).await.unwrap();
        repo.create(&new_category("Art", "art", None)).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Art", "Books"]);
        assert_eq!(repo.count_contents(b.id).await.unwrap(), 0);
    }
}
