//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod bookmark;
pub mod category;
pub mod comment;
pub mod content;
pub mod follow;
pub mod rating;
pub mod stats;
pub mod user;

pub use bookmark::{BookmarkRepository, SqlxBookmarkRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use rating::{RatingRepository, SqlxRatingRepository};
pub use stats::{SqlxStatsRepository, StatsRepository};
pub use user::{SqlxUserRepository, UserRepository, UserSettingsRepository};
