//! Social service
//!
//! Likes ("ratings"), follows and bookmarks. Each relation is unique per
//! pair in the schema, so duplicates surface as unique violations and are
//! reported as conflicts.

use crate::db::repositories::{
    BookmarkRepository, ContentRepository, FollowRepository, RatingRepository, StatsRepository,
    UserRepository,
};
use crate::db::{constraint_violation, ConstraintViolation};
use crate::models::{
    Bookmark, Content, Follow, LikeSummary, ListParams, PagedResult, PublicProfile, User, UserStats,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for social operations
#[derive(Debug, thiserror::Error)]
pub enum SocialServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Repositories the social service works with
pub struct SocialRepositories {
    pub ratings: Arc<dyn RatingRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub contents: Arc<dyn ContentRepository>,
    pub users: Arc<dyn UserRepository>,
    pub stats: Arc<dyn StatsRepository>,
}

pub struct SocialService {
    repos: SocialRepositories,
}

impl SocialService {
    pub fn new(repos: SocialRepositories) -> Self {
        Self { repos }
    }

    // ------------------------------------------------------------------
    // Likes
    // ------------------------------------------------------------------

    /// Like a content item the caller can see
    pub async fn like(&self, actor: &User, content_id: i64) -> Result<LikeSummary, SocialServiceError> {
        self.visible_content(Some(actor), content_id).await?;
        self.repos
            .ratings
            .create(actor.id, content_id)
            .await
            .map_err(|err| relation_error(err, "You already liked this content"))?;
        self.like_summary(Some(actor), content_id).await
    }

    pub async fn unlike(&self, actor: &User, content_id: i64) -> Result<(), SocialServiceError> {
        if !self
            .repos
            .ratings
            .delete(actor.id, content_id)
            .await
            .context("Failed to remove like")?
        {
            return Err(SocialServiceError::NotFound(format!(
                "You have not liked content {}",
                content_id
            )));
        }
        Ok(())
    }

    /// Like count of a content item and whether the viewer is among the likers
    pub async fn summary(&self, viewer: Option<&User>, content_id: i64) -> Result<LikeSummary, SocialServiceError> {
        self.visible_content(viewer, content_id).await?;
        self.like_summary(viewer, content_id).await
    }

    /// Published content the caller liked, most recent like first
    pub async fn list_liked(&self, actor: &User, params: &ListParams) -> Result<PagedResult<Content>, SocialServiceError> {
        let items = self
            .repos
            .ratings
            .list_liked(actor.id, params.limit, params.offset)
            .await
            .context("Failed to list liked content")?;
        let total = self
            .repos
            .ratings
            .count_liked(actor.id)
            .await
            .context("Failed to count liked content")?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn like_summary(&self, viewer: Option<&User>, content_id: i64) -> Result<LikeSummary, SocialServiceError> {
        let like_count = self
            .repos
            .ratings
            .count_for_content(content_id)
            .await
            .context("Failed to count likes")?;
        let liked_by_me = match viewer {
            Some(user) => self
                .repos
                .ratings
                .exists(user.id, content_id)
                .await
                .context("Failed to check like")?,
            None => false,
        };
        Ok(LikeSummary {
            content_id,
            like_count,
            liked_by_me,
        })
    }

    // ------------------------------------------------------------------
    // Follows
    // ------------------------------------------------------------------

    pub async fn follow(&self, actor: &User, user_id: i64) -> Result<Follow, SocialServiceError> {
        if actor.id == user_id {
            return Err(SocialServiceError::Validation("You cannot follow yourself".to_string()));
        }
        self.existing_user(user_id).await?;

        let follow = self
            .repos
            .follows
            .create(actor.id, user_id)
            .await
            .map_err(|err| relation_error(err, "You already follow this user"))?;

        tracing::debug!(follower = actor.id, following = user_id, "Follow created");
        Ok(follow)
    }

    pub async fn unfollow(&self, actor: &User, user_id: i64) -> Result<(), SocialServiceError> {
        if !self
            .repos
            .follows
            .delete(actor.id, user_id)
            .await
            .context("Failed to remove follow")?
        {
            return Err(SocialServiceError::NotFound(format!(
                "You do not follow user {}",
                user_id
            )));
        }
        Ok(())
    }

    pub async fn followers(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<PublicProfile>, SocialServiceError> {
        self.existing_user(user_id).await?;
        let users = self
            .repos
            .follows
            .list_followers(user_id, params.limit, params.offset)
            .await
            .context("Failed to list followers")?;
        let total = self
            .repos
            .follows
            .count_followers(user_id)
            .await
            .context("Failed to count followers")?;
        Ok(PagedResult::new(users, total, params).map(PublicProfile::from))
    }

    pub async fn following(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<PublicProfile>, SocialServiceError> {
        self.existing_user(user_id).await?;
        let users = self
            .repos
            .follows
            .list_following(user_id, params.limit, params.offset)
            .await
            .context("Failed to list followed users")?;
        let total = self
            .repos
            .follows
            .count_following(user_id)
            .await
            .context("Failed to count followed users")?;
        Ok(PagedResult::new(users, total, params).map(PublicProfile::from))
    }

    /// Follower and following counts from the statistics read-model.
    ///
    /// On PostgreSQL the counts lag until the next refresh.
    pub async fn stats(&self, user_id: i64) -> Result<UserStats, SocialServiceError> {
        self.existing_user(user_id).await?;
        let stats = self
            .repos
            .stats
            .user_stats(user_id)
            .await
            .context("Failed to load user stats")?;
        Ok(stats.unwrap_or(UserStats {
            user_id,
            ..UserStats::default()
        }))
    }

    // ------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------

    pub async fn bookmark(&self, actor: &User, content_id: i64) -> Result<Bookmark, SocialServiceError> {
        self.visible_content(Some(actor), content_id).await?;
        self.repos
            .bookmarks
            .create(actor.id, content_id)
            .await
            .map_err(|err| relation_error(err, "Content is already bookmarked"))
    }

    pub async fn remove_bookmark(&self, actor: &User, content_id: i64) -> Result<(), SocialServiceError> {
        if !self
            .repos
            .bookmarks
            .delete(actor.id, content_id)
            .await
            .context("Failed to remove bookmark")?
        {
            return Err(SocialServiceError::NotFound(format!(
                "Content {} is not bookmarked",
                content_id
            )));
        }
        Ok(())
    }

    /// Bookmarked content the caller can still see, newest bookmark first
    pub async fn list_bookmarks(&self, actor: &User, params: &ListParams) -> Result<PagedResult<Content>, SocialServiceError> {
        let items = self
            .repos
            .bookmarks
            .list_contents(actor.id, params.limit, params.offset)
            .await
            .context("Failed to list bookmarks")?;
        let total = self
            .repos
            .bookmarks
            .count(actor.id)
            .await
            .context("Failed to count bookmarks")?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn visible_content(&self, viewer: Option<&User>, content_id: i64) -> Result<Content, SocialServiceError> {
        self.repos
            .contents
            .get_by_id(content_id)
            .await
            .context("Failed to get content")?
            .filter(|content| content.is_visible_to(viewer))
            .ok_or_else(|| SocialServiceError::NotFound(format!("Content {} not found", content_id)))
    }

    async fn existing_user(&self, user_id: i64) -> Result<User, SocialServiceError> {
        self.repos
            .users
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| SocialServiceError::NotFound(format!("User {} not found", user_id)))
    }
}

fn relation_error(err: anyhow::Error, duplicate: &str) -> SocialServiceError {
    match constraint_violation(&err) {
        Some(ConstraintViolation::Unique) => SocialServiceError::Conflict(duplicate.to_string()),
        Some(ConstraintViolation::Check) => {
            SocialServiceError::Validation("Relation violates a data constraint".to_string())
        }
        Some(ConstraintViolation::ForeignKey) => {
            SocialServiceError::NotFound("Referenced user or content no longer exists".to_string())
        }
        None => SocialServiceError::Internal(err),
    }
}
