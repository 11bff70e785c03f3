//! Content model
//!
//! A content item is a typed union of article, video, image and audio with a
//! publication lifecycle:
//!
//! ```text
//! draft <-> pending -> published <-> archived
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::User;

/// Content entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Content {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub author_id: i64,
    pub category_id: i64,
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    /// Article text; required for articles
    pub body: Option<String>,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    /// Media location; required for video, image and audio
    pub media_url: Option<String>,
    /// Playback length; video and audio only
    pub duration_seconds: Option<i32>,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    pub view_count: i64,
    /// Set on the first transition into `published`, never changed afterwards
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Check if the content is publicly visible
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    /// Published content is public; anything else only its author and admins see
    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        self.is_published() || viewer.is_some_and(|u| u.can_modify(self.author_id))
    }
}

/// Kind of media a content item carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Article,
    Video,
    Image,
    Audio,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::Video => "video",
            ContentType::Image => "image",
            ContentType::Audio => "audio",
        }
    }

    /// Video and audio have a playback duration
    pub fn is_timed(&self) -> bool {
        matches!(self, ContentType::Video | ContentType::Audio)
    }

    /// Everything except articles points at a media file
    pub fn requires_media(&self) -> bool {
        !matches!(self, ContentType::Article)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "article" => Ok(ContentType::Article),
            "video" => Ok(ContentType::Video),
            "image" => Ok(ContentType::Image),
            "audio" => Ok(ContentType::Audio),
            _ => Err(anyhow::anyhow!("Invalid content type: {}", s)),
        }
    }
}

impl TryFrom<String> for ContentType {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Pending,
    Published,
    Archived,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Pending => "pending",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
        }
    }

    /// Whether `self -> next` is an allowed lifecycle step.
    ///
    /// Staying in the same status is allowed and treated as a no-op.
    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        self == next
            || matches!(
                (self, next),
                (Draft, Pending)
                    | (Pending, Draft)
                    | (Pending, Published)
                    | (Published, Archived)
                    | (Archived, Published)
            )
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ContentStatus::Draft),
            "pending" => Ok(ContentStatus::Pending),
            "published" => Ok(ContentStatus::Published),
            "archived" => Ok(ContentStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

impl TryFrom<String> for ContentStatus {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Input for creating content
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentInput {
    pub title: String,
    pub category_id: i64,
    pub content_type: ContentType,
    pub description: Option<String>,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub duration_seconds: Option<i32>,
    /// Initial status; defaults to draft
    pub status: Option<ContentStatus>,
}

/// Input for updating content. The type of a content item is fixed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContentInput {
    pub title: Option<String>,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub duration_seconds: Option<i32>,
}

/// Filters for the public content listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub content_type: Option<ContentType>,
}

/// Content row with its relevance score
#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct SearchHit {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub content: Content,
    pub score: f64,
}

/// Published content with the engagement counts trending is computed from
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EngagementRow {
    #[sqlx(flatten)]
    pub content: Content,
    pub like_count: i64,
    pub comment_count: i64,
}

/// Content ranked by trending score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingContent {
    #[serde(flatten)]
    pub content: Content,
    pub like_count: i64,
    pub comment_count: i64,
    pub score: f64,
}
