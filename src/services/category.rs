//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories
//! - Hierarchical category tree
//! - Name and slug uniqueness
//! - Slug generation from name
//!
//! The flat list and the tree are cached and dropped on every write.

use crate::cache::{CacheLayer, MemoryCache, CATEGORY_LIST_KEY, CATEGORY_PATTERN, CATEGORY_TREE_KEY};
use crate::db::repositories::CategoryRepository;
use crate::db::{constraint_violation, ConstraintViolation};
use crate::models::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const NAME_MAX_LEN: usize = 100;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    /// Duplicate name or slug, or a delete blocked by referencing content
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Category service for managing content categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<MemoryCache>, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `Validation` for an empty name or slug, or a missing parent
    /// - `Conflict` if the name or slug is taken
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let slug = match input.slug {
            Some(slug) => validate_slug(&slug)?,
            None => validate_slug(&generate_slug(&name))?,
        };

        if self.repo.exists_by_name(&name).await.context("Failed to check name uniqueness")? {
            return Err(CategoryServiceError::Conflict(format!(
                "Category name '{}' already exists",
                name
            )));
        }
        if self.repo.exists_by_slug(&slug).await.context("Failed to check slug uniqueness")? {
            return Err(CategoryServiceError::Conflict(format!(
                "Category slug '{}' already exists",
                slug
            )));
        }
        if let Some(parent_id) = input.parent_id {
            self.ensure_parent_exists(parent_id).await?;
        }

        let now = Utc::now();
        let category = Category {
            id: 0,
            name,
            slug,
            description: non_empty(input.description),
            parent_id: input.parent_id,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&category).await.map_err(conflict_on_unique)?;
        self.invalidate_cache().await;

        tracing::info!(category_id = created.id, slug = %created.slug, "Category created");
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| CategoryServiceError::NotFound(format!("Category {} not found", id)))
    }

    /// List all categories (flat, by name)
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(list) = self.cache.get::<Vec<Category>>(CATEGORY_LIST_KEY).await.ok().flatten() {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        if let Err(e) = self.cache.set(CATEGORY_LIST_KEY, &list, self.cache_ttl).await {
            tracing::warn!("Failed to cache category list: {}", e);
        }

        Ok(list)
    }

    /// Get the category tree. Categories whose parent is gone become roots.
    pub async fn list_tree(&self) -> Result<Vec<CategoryTree>, CategoryServiceError> {
        if let Some(tree) = self.cache.get::<Vec<CategoryTree>>(CATEGORY_TREE_KEY).await.ok().flatten() {
            return Ok(tree);
        }

        let tree = CategoryTree::build(&self.list().await?);
        if let Err(e) = self.cache.set(CATEGORY_TREE_KEY, &tree, self.cache_ttl).await {
            tracing::warn!("Failed to cache category tree: {}", e);
        }

        Ok(tree)
    }

    /// Update a category
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `Conflict` if the new name or slug is taken
    /// - `Validation` if the new parent is missing or would create a cycle
    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;

        if let Some(ref new_name) = input.name {
            let new_name = validate_name(new_name)?;
            if new_name != category.name {
                if self.repo.exists_by_name(&new_name).await.context("Failed to check name uniqueness")? {
                    return Err(CategoryServiceError::Conflict(format!(
                        "Category name '{}' already exists",
                        new_name
                    )));
                }
                category.name = new_name;
            }
        }

        if let Some(ref new_slug) = input.slug {
            let new_slug = validate_slug(new_slug)?;
            if new_slug != category.slug {
                if self.repo.exists_by_slug(&new_slug).await.context("Failed to check slug uniqueness")? {
                    return Err(CategoryServiceError::Conflict(format!(
                        "Category slug '{}' already exists",
                        new_slug
                    )));
                }
                category.slug = new_slug;
            }
        }

        if let Some(description) = input.description {
            category.description = non_empty(Some(description));
        }

        if let Some(new_parent_id) = input.parent_id {
            if let Some(parent_id) = new_parent_id {
                self.ensure_parent_exists(parent_id).await?;
                if self.would_create_cycle(id, parent_id).await? {
                    return Err(CategoryServiceError::Validation(
                        "A category cannot be moved under itself or one of its descendants".to_string(),
                    ));
                }
            }
            category.parent_id = new_parent_id;
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .map_err(conflict_on_unique)?
            .ok_or_else(|| CategoryServiceError::NotFound(format!("Category {} not found", id)))?;
        self.invalidate_cache().await;

        Ok(updated)
    }

    /// Delete a category.
    ///
    /// Refused while content still references it. Child categories are
    /// moved to the root by the database.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        self.get_by_id(id).await?;

        let in_use = self.repo.count_contents(id).await.context("Failed to count category contents")?;
        if in_use > 0 {
            return Err(CategoryServiceError::Conflict(format!(
                "Category {} still has {} content item(s)",
                id, in_use
            )));
        }

        let deleted = self.repo.delete(id).await.map_err(|err| match constraint_violation(&err) {
            Some(ConstraintViolation::ForeignKey) => {
                CategoryServiceError::Conflict(format!("Category {} is still referenced by content", id))
            }
            _ => CategoryServiceError::Internal(err),
        })?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(format!("Category {} not found", id)));
        }
        self.invalidate_cache().await;

        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }

    /// Whether a category exists
    pub async fn exists(&self, id: i64) -> Result<bool, CategoryServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get category")?.is_some())
    }

    async fn ensure_parent_exists(&self, parent_id: i64) -> Result<(), CategoryServiceError> {
        if !self.exists(parent_id).await? {
            return Err(CategoryServiceError::Validation(format!(
                "Parent category {} does not exist",
                parent_id
            )));
        }
        Ok(())
    }

    /// Walk up from the new parent; reaching `category_id` means a cycle
    async fn would_create_cycle(&self, category_id: i64, new_parent_id: i64) -> Result<bool, CategoryServiceError> {
        let categories = self.repo.list().await.context("Failed to list categories")?;
        Ok(creates_cycle(&categories, category_id, new_parent_id))
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_pattern(CATEGORY_PATTERN).await {
            tracing::warn!("Failed to invalidate category cache: {}", e);
        }
    }
}

fn creates_cycle(categories: &[Category], category_id: i64, new_parent_id: i64) -> bool {
    let mut current = Some(new_parent_id);
    // Bounded by the number of categories in case the stored data already loops
    for _ in 0..=categories.len() {
        match current {
            None => return false,
            Some(id) if id == category_id => return true,
            Some(id) => {
                current = categories.iter().find(|c| c.id == id).and_then(|c| c.parent_id);
            }
        }
    }
    true
}

fn conflict_on_unique(err: anyhow::Error) -> CategoryServiceError {
    match constraint_violation(&err) {
        Some(ConstraintViolation::Unique) => {
            CategoryServiceError::Conflict("Category name or slug already exists".to_string())
        }
        _ => CategoryServiceError::Internal(err),
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::Validation("Category name cannot be empty".to_string()));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(CategoryServiceError::Validation(format!(
            "Category name must be at most {} characters",
            NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_slug(slug: &str) -> Result<String, CategoryServiceError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(CategoryServiceError::Validation("Category slug cannot be empty".to_string()));
    }
    if slug.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(CategoryServiceError::Validation(format!("Invalid category slug: {}", slug)));
    }
    Ok(slug.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Generate a URL-friendly slug from a name
///
/// Lowercases, keeps letters and digits (including non-ASCII ones), and
/// collapses every other run of characters into a single hyphen.
pub fn generate_slug(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}
