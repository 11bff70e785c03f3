//! Services layer - Business logic
//!
//! This module contains all business logic services for the mediapress backend.
//! Services are responsible for:
//! - Implementing business rules and permission checks
//! - Coordinating between repositories and cache
//! - Handling validation and error cases

pub mod category;
pub mod comment;
pub mod content;
pub mod password;
pub mod ranking;
pub mod social;
pub mod token;
pub mod user;

pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use content::{ContentService, ContentServiceError};
pub use password::{hash_password, verify_password};
pub use ranking::RankingService;
pub use social::{SocialRepositories, SocialService, SocialServiceError};
pub use token::{Claims, TokenError, TokenService};
pub use user::{UserService, UserServiceError};
