//! Data models
//!
//! This module contains all data structures used throughout the mediapress backend.
//! Models represent:
//! - Database entities (User, Category, Content, Comment, Rating, Follow, Bookmark)
//! - API request/response types
//! - Pagination parameters and pages

mod category;
mod comment;
mod content;
mod pagination;
mod social;
mod user;

pub(crate) use category::double_option;
pub use category::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CommentNode, CreateCommentInput, UpdateCommentInput};
pub use content::{
    Content, ContentFilter, ContentStatus, ContentType, CreateContentInput, EngagementRow,
    SearchHit, TrendingContent, UpdateContentInput,
};
pub use pagination::{ListParams, PagedResult, PaginationError, DEFAULT_LIMIT, MAX_LIMIT};
pub use social::{Bookmark, Follow, FollowInput, LikeInput, LikeSummary, Rating};
pub use user::{
    LoginInput, PublicProfile, RegisterInput, UpdateProfileInput, UpdateSettingsInput, User,
    UserRole, UserSettings, UserStats,
};
