//! Comment service
//!
//! Threaded comments on content items. Only content the caller can see
//! can be read or commented on; replies must stay on the same content.

use crate::db::repositories::{CommentRepository, ContentRepository};
use crate::db::{constraint_violation, ConstraintViolation};
use crate::models::{Comment, CommentNode, Content, CreateCommentInput, User};
use anyhow::Context;
use std::sync::Arc;

/// Maximum comment length, in characters
pub const MAX_COMMENT_LEN: usize = 5000;

/// Deepest allowed reply nesting; top-level comments are depth 0
pub const MAX_REPLY_DEPTH: usize = 8;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    contents: Arc<dyn ContentRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, contents: Arc<dyn ContentRepository>) -> Self {
        Self { comments, contents }
    }

    /// Post a comment or a reply
    pub async fn create(&self, author: &User, input: CreateCommentInput) -> Result<Comment, CommentServiceError> {
        let body = validate_body(&input.body)?;
        self.visible_content(Some(author), input.content_id).await?;

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .comments
                .get_by_id(parent_id)
                .await
                .context("Failed to get parent comment")?;
            match parent {
                Some(parent) if parent.content_id == input.content_id => {
                    if self.depth_of(&parent).await? >= MAX_REPLY_DEPTH {
                        return Err(CommentServiceError::Validation(format!(
                            "Replies can be nested at most {} levels deep",
                            MAX_REPLY_DEPTH
                        )));
                    }
                }
                Some(_) => {
                    return Err(CommentServiceError::Validation(
                        "Parent comment belongs to different content".to_string(),
                    ))
                }
                None => {
                    return Err(CommentServiceError::Validation(format!(
                        "Parent comment {} does not exist",
                        parent_id
                    )))
                }
            }
        }

        let comment = self
            .comments
            .create(input.content_id, author.id, input.parent_id, &body)
            .await
            .map_err(|err| match constraint_violation(&err) {
                // Content or parent removed between the checks and the insert
                Some(ConstraintViolation::ForeignKey) => {
                    CommentServiceError::NotFound("Content or parent comment no longer exists".to_string())
                }
                _ => CommentServiceError::Internal(err),
            })?;

        tracing::debug!(comment_id = comment.id, content_id = comment.content_id, "Comment created");
        Ok(comment)
    }

    /// All comments of a content item as reply trees, oldest first
    pub async fn list_for_content(
        &self,
        viewer: Option<&User>,
        content_id: i64,
    ) -> Result<Vec<CommentNode>, CommentServiceError> {
        self.visible_content(viewer, content_id).await?;
        let comments = self
            .comments
            .list_by_content(content_id)
            .await
            .context("Failed to list comments")?;
        Ok(CommentNode::build_tree(comments))
    }

    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.find(id).await?;
        self.visible_content(viewer, comment.content_id).await?;
        Ok(comment)
    }

    /// Edit a comment's text (author only)
    pub async fn update(&self, actor: &User, id: i64, body: &str) -> Result<Comment, CommentServiceError> {
        let body = validate_body(body)?;
        let comment = self.find(id).await?;
        if comment.user_id != actor.id {
            return Err(CommentServiceError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        self.comments
            .update_body(id, &body)
            .await
            .context("Failed to update comment")?
            .ok_or_else(|| not_found(id))
    }

    /// Delete a comment and its replies (author or admin)
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), CommentServiceError> {
        let comment = self.find(id).await?;
        if !actor.can_modify(comment.user_id) {
            return Err(CommentServiceError::Forbidden(
                "Only the author or an admin can delete this comment".to_string(),
            ));
        }

        if !self.comments.delete(id).await.context("Failed to delete comment")? {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Number of ancestors above `comment`, counting no further than the cap
    async fn depth_of(&self, comment: &Comment) -> Result<usize, CommentServiceError> {
        let mut depth = 0;
        let mut parent_id = comment.parent_id;
        while let Some(id) = parent_id {
            depth += 1;
            if depth >= MAX_REPLY_DEPTH {
                break;
            }
            parent_id = self
                .comments
                .get_by_id(id)
                .await
                .context("Failed to get parent comment")?
                .and_then(|ancestor| ancestor.parent_id);
        }
        Ok(depth)
    }

    async fn find(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.comments
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or_else(|| not_found(id))
    }

    async fn visible_content(&self, viewer: Option<&User>, content_id: i64) -> Result<Content, CommentServiceError> {
        self.contents
            .get_by_id(content_id)
            .await
            .context("Failed to get content")?
            .filter(|content| content.is_visible_to(viewer))
            .ok_or_else(|| CommentServiceError::NotFound(format!("Content {} not found", content_id)))
    }
}

fn not_found(id: i64) -> CommentServiceError {
    CommentServiceError::NotFound(format!("Comment {} not found", id))
}

fn validate_body(body: &str) -> Result<String, CommentServiceError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(CommentServiceError::Validation("Comment cannot be empty".to_string()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentServiceError::Validation(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(body.to_string())
}
