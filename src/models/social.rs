//! Social graph models: ratings ("likes"), follows and bookmarks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single "like" from a user on a content item. Unique per pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub content_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Directed edge: `follower_id` follows `following_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: i64,
    pub following_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Saved content for a user. Unique per pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    pub content_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Like count of a content item, plus whether the caller liked it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeSummary {
    pub content_id: i64,
    pub like_count: i64,
    /// `false` for anonymous callers
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeInput {
    pub content_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowInput {
    pub user_id: i64,
}
