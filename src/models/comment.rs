//! Comment model
//!
//! Comments are threaded through a nullable `parent_id` pointing at another
//! comment on the same content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub content_id: i64,
    /// Author of the comment
    pub user_id: i64,
    /// Parent comment ID (for replies)
    pub parent_id: Option<i64>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment with its replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Build reply trees from a flat list ordered by creation time.
    ///
    /// Replies whose parent is not in the list are promoted to top level.
    pub fn build_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
        let ids: std::collections::HashSet<i64> = comments.iter().map(|c| c.id).collect();
        let mut children: HashMap<Option<i64>, Vec<Comment>> = HashMap::new();
        for comment in comments {
            let parent = comment.parent_id.filter(|p| ids.contains(p));
            children.entry(parent).or_default().push(comment);
        }

        fn attach(parent: Option<i64>, children: &mut HashMap<Option<i64>, Vec<Comment>>) -> Vec<CommentNode> {
            children
                .remove(&parent)
                .unwrap_or_default()
                .into_iter()
                .map(|comment| {
                    let replies = attach(Some(comment.id), children);
                    CommentNode { comment, replies }
                })
                .collect()
        }

        attach(None, &mut children)
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub content_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
}

/// Input for editing a comment
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentInput {
    pub body: String,
}
