//! Content service
//!
//! Implements business logic for content items:
//! - Typed content (article, video, image, audio) validation
//! - Unique slug generation from the title
//! - Status lifecycle with `published_at` set once on first publication
//! - Visibility: published content is public, the rest owner/admin only
//! - View counting

use crate::db::repositories::{CategoryRepository, ContentRepository};
use crate::db::{constraint_violation, ConstraintViolation};
use crate::models::{
    Content, ContentFilter, ContentStatus, ContentType, CreateContentInput, ListParams, PagedResult,
    UpdateContentInput, User,
};
use crate::services::category::generate_slug;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Maximum title length, in characters
pub const TITLE_MAX_LEN: usize = 200;

const DESCRIPTION_MAX_LEN: usize = 2000;

/// How many numbered slug variants to try before giving up
const SLUG_ATTEMPTS: usize = 1000;

/// Error types for content, search and ranking operations
#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Content service
pub struct ContentService {
    contents: Arc<dyn ContentRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl ContentService {
    pub fn new(contents: Arc<dyn ContentRepository>, categories: Arc<dyn CategoryRepository>) -> Self {
        Self {
            contents,
            categories,
        }
    }

    /// Create a content item owned by `author`.
    ///
    /// New content is a draft unless `pending` or `published` is requested.
    /// Publishing on creation stamps `published_at`.
    pub async fn create(
        &self,
        author: &User,
        input: CreateContentInput,
    ) -> Result<Content, ContentServiceError> {
        let title = validate_title(&input.title)?;
        let description = trimmed(input.description);
        if let Some(ref text) = description {
            check_description(text)?;
        }
        let body = trimmed(input.body);
        let media_url = trimmed(input.media_url);
        validate_shape(input.content_type, body.as_deref(), media_url.as_deref(), input.duration_seconds)?;
        self.ensure_category_exists(input.category_id).await?;

        let status = match input.status.unwrap_or_default() {
            ContentStatus::Archived => {
                return Err(ContentServiceError::Validation(
                    "New content cannot be archived".to_string(),
                ))
            }
            status => status,
        };

        let now = Utc::now();
        let slug = self.unique_slug(&title).await?;
        let content = Content {
            id: 0,
            author_id: author.id,
            category_id: input.category_id,
            title,
            slug,
            description,
            body,
            content_type: input.content_type,
            media_url,
            duration_seconds: input.duration_seconds,
            status,
            view_count: 0,
            published_at: (status == ContentStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self.contents.create(&content).await.map_err(map_write_error)?;
        tracing::info!(
            content_id = created.id,
            author_id = author.id,
            content_type = %created.content_type,
            status = %created.status,
            "Content created"
        );
        Ok(created)
    }

    /// Fetch a content item as seen by `viewer`.
    ///
    /// Non-published content is reported as missing to everyone except its
    /// author and admins. Reading published content counts a view.
    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<Content, ContentServiceError> {
        let mut content = self.load_visible(viewer, id).await?;

        if content.is_published() {
            self.contents
                .increment_views(id)
                .await
                .context("Failed to count view")?;
            content.view_count += 1;
        }

        Ok(content)
    }

    /// Fetch without counting a view. Same visibility rules as [`get`](Self::get).
    pub async fn load_visible(&self, viewer: Option<&User>, id: i64) -> Result<Content, ContentServiceError> {
        let content = self.find(id).await?;
        if content.is_visible_to(viewer) {
            Ok(content)
        } else {
            Err(not_found(id))
        }
    }

    /// List published content, newest first
    pub async fn list(
        &self,
        filter: &ContentFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Content>, ContentServiceError> {
        let items = self
            .contents
            .list_published(filter, params.limit, params.offset)
            .await
            .context("Failed to list content")?;
        let total = self
            .contents
            .count_published(filter)
            .await
            .context("Failed to count content")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// List the caller's own content in every status
    pub async fn list_mine(
        &self,
        author: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Content>, ContentServiceError> {
        let items = self
            .contents
            .list_by_author(author.id, params.limit, params.offset)
            .await
            .context("Failed to list own content")?;
        let total = self
            .contents
            .count_by_author(author.id)
            .await
            .context("Failed to count own content")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Edit a content item (author or admin).
    ///
    /// Empty strings clear optional text fields. The content type and slug
    /// never change.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateContentInput,
    ) -> Result<Content, ContentServiceError> {
        let mut content = self.find_modifiable(actor, id).await?;

        if let Some(ref title) = input.title {
            content.title = validate_title(title)?;
        }
        if let Some(description) = input.description {
            content.description = trimmed(Some(description));
            if let Some(ref text) = content.description {
                check_description(text)?;
            }
        }
        if let Some(body) = input.body {
            content.body = trimmed(Some(body));
        }
        if let Some(media_url) = input.media_url {
            content.media_url = trimmed(Some(media_url));
        }
        if input.duration_seconds.is_some() {
            content.duration_seconds = input.duration_seconds;
        }
        validate_shape(
            content.content_type,
            content.body.as_deref(),
            content.media_url.as_deref(),
            content.duration_seconds,
        )?;
        if let Some(category_id) = input.category_id {
            if category_id != content.category_id {
                self.ensure_category_exists(category_id).await?;
                content.category_id = category_id;
            }
        }

        self.contents
            .update(&content)
            .await
            .map_err(map_write_error)?
            .ok_or_else(|| not_found(id))
    }

    /// Move a content item through its lifecycle (author or admin).
    ///
    /// Requesting the current status is a no-op. `published_at` is written
    /// by the first transition into `published` and never again.
    pub async fn change_status(
        &self,
        actor: &User,
        id: i64,
        status: ContentStatus,
    ) -> Result<Content, ContentServiceError> {
        let content = self.find_modifiable(actor, id).await?;
        if content.status == status {
            return Ok(content);
        }
        if !content.status.can_transition_to(status) {
            return Err(ContentServiceError::Validation(format!(
                "Cannot change status from {} to {}",
                content.status, status
            )));
        }

        let updated = self
            .contents
            .update_status(id, status, Utc::now())
            .await
            .map_err(map_write_error)?
            .ok_or_else(|| not_found(id))?;

        tracing::info!(content_id = id, from = %content.status, to = %status, by = actor.id, "Content status changed");
        Ok(updated)
    }

    /// Delete a content item (author or admin). Comments, likes and
    /// bookmarks go with it.
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ContentServiceError> {
        self.find_modifiable(actor, id).await?;
        if !self.contents.delete(id).await.context("Failed to delete content")? {
            return Err(not_found(id));
        }
        tracing::info!(content_id = id, by = actor.id, "Content deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Content, ContentServiceError> {
        self.contents
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .ok_or_else(|| not_found(id))
    }

    async fn find_modifiable(&self, actor: &User, id: i64) -> Result<Content, ContentServiceError> {
        let content = self.find(id).await?;
        if !actor.can_modify(content.author_id) {
            // Other people's drafts stay invisible
            if !content.is_published() {
                return Err(not_found(id));
            }
            return Err(ContentServiceError::Forbidden(
                "Only the author or an admin can modify this content".to_string(),
            ));
        }
        Ok(content)
    }

    async fn ensure_category_exists(&self, category_id: i64) -> Result<(), ContentServiceError> {
        if self
            .categories
            .get_by_id(category_id)
            .await
            .context("Failed to get category")?
            .is_none()
        {
            return Err(ContentServiceError::Validation(format!(
                "Category {} does not exist",
                category_id
            )));
        }
        Ok(())
    }

    /// `base`, then `base-2`, `base-3`, ... until one is free
    async fn unique_slug(&self, title: &str) -> Result<String, ContentServiceError> {
        let mut base = generate_slug(title);
        if base.is_empty() {
            base = "content".to_string();
        }

        for attempt in 1..=SLUG_ATTEMPTS {
            let candidate = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            if !self
                .contents
                .exists_by_slug(&candidate)
                .await
                .context("Failed to check content slug")?
            {
                return Ok(candidate);
            }
        }

        Err(ContentServiceError::Conflict(format!(
            "Could not find a free slug for '{}'",
            base
        )))
    }
}

fn not_found(id: i64) -> ContentServiceError {
    ContentServiceError::NotFound(format!("Content {} not found", id))
}

fn map_write_error(err: anyhow::Error) -> ContentServiceError {
    match constraint_violation(&err) {
        Some(ConstraintViolation::Unique) => {
            ContentServiceError::Conflict("Content slug is already taken".to_string())
        }
        Some(ConstraintViolation::Check) => {
            ContentServiceError::Validation("Content violates a data constraint".to_string())
        }
        Some(ConstraintViolation::ForeignKey) => {
            ContentServiceError::Validation("Referenced category or author does not exist".to_string())
        }
        None => ContentServiceError::Internal(err),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_title(title: &str) -> Result<String, ContentServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentServiceError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(ContentServiceError::Validation(format!(
            "Title must be at most {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

fn check_description(description: &str) -> Result<(), ContentServiceError> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(ContentServiceError::Validation(format!(
            "Description must be at most {} characters",
            DESCRIPTION_MAX_LEN
        )));
    }
    Ok(())
}

/// Fields each content type requires:
/// articles need a body, media types a `media_url`, and only video and
/// audio may carry a positive `duration_seconds`.
pub fn validate_shape(
    content_type: ContentType,
    body: Option<&str>,
    media_url: Option<&str>,
    duration_seconds: Option<i32>,
) -> Result<(), ContentServiceError> {
    if content_type == ContentType::Article && body.is_none() {
        return Err(ContentServiceError::Validation("Articles require a body".to_string()));
    }
    if content_type.requires_media() && media_url.is_none() {
        return Err(ContentServiceError::Validation(format!(
            "{} content requires a media_url",
            content_type
        )));
    }
    match duration_seconds {
        Some(_) if !content_type.is_timed() => Err(ContentServiceError::Validation(format!(
            "{} content cannot have a duration",
            content_type
        ))),
        Some(seconds) if seconds <= 0 => Err(ContentServiceError::Validation(
            "duration_seconds must be positive".to_string(),
        )),
        _ => Ok(()),
    }
}
