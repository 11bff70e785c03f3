//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and service error mapping
//! - Authentication (bearer token validation)
//! - Authorization (admin role checking)

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBookmarkRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxContentRepository,
    SqlxFollowRepository, SqlxRatingRepository, SqlxStatsRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{PaginationError, User};
use crate::services::{
    CategoryService, CategoryServiceError, CommentService, CommentServiceError, ContentService,
    ContentServiceError, RankingService, SocialRepositories, SocialService, SocialServiceError,
    TokenService, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub content_service: Arc<ContentService>,
    pub comment_service: Arc<CommentService>,
    pub social_service: Arc<SocialService>,
    pub ranking_service: Arc<RankingService>,
}

impl AppState {
    /// Wire repositories, cache and services on top of `pool`
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let cache = create_cache(&config.cache);
        let cache_ttl = Duration::from_secs(config.cache.ttl_seconds);
        let tokens = Arc::new(TokenService::from_config(&config.auth));

        let users = SqlxUserRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let contents = SqlxContentRepository::boxed(pool.clone());
        let stats = SqlxStatsRepository::boxed(pool.clone());

        let user_service = UserService::new(
            users.clone(),
            SqlxUserRepository::boxed_settings(pool.clone()),
            tokens,
        );
        let category_service = CategoryService::new(categories.clone(), cache.clone(), cache_ttl);
        let content_service = ContentService::new(contents.clone(), categories);
        let comment_service =
            CommentService::new(SqlxCommentRepository::boxed(pool.clone()), contents.clone());
        let social_service = SocialService::new(SocialRepositories {
            ratings: SqlxRatingRepository::boxed(pool.clone()),
            follows: SqlxFollowRepository::boxed(pool.clone()),
            bookmarks: SqlxBookmarkRepository::boxed(pool.clone()),
            contents: contents.clone(),
            users,
            stats: stats.clone(),
        });
        let ranking_service =
            RankingService::new(contents, stats, cache, cache_ttl, config.ranking.clone());

        Self {
            pool,
            user_service: Arc::new(user_service),
            category_service: Arc::new(category_service),
            content_service: Arc::new(content_service),
            comment_service: Arc::new(comment_service),
            social_service: Arc::new(social_service),
            ranking_service: Arc::new(ranking_service),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}

// ============================================================================
// Error envelope
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    /// Log the cause and hide it behind the generic 500 message
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    /// Map an internal service failure. An exhausted or closed database pool
    /// is reported as 503 so clients can retry.
    fn from_internal(err: anyhow::Error) -> Self {
        match err.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                tracing::warn!("Database unavailable: {:#}", err);
                Self::service_unavailable("Database is unavailable")
            }
            _ => Self::internal_error(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        let field = match err {
            PaginationError::InvalidLimit => "limit",
            PaginationError::InvalidOffset => "offset",
        };
        ApiError::with_details(
            "VALIDATION_ERROR",
            err.to_string(),
            serde_json::json!({ "field": field }),
        )
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Validation(msg) => ApiError::validation_error(msg),
            UserServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::Conflict(msg) => ApiError::conflict(msg),
            UserServiceError::Internal(e) => ApiError::from_internal(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::Validation(msg) => ApiError::validation_error(msg),
            CategoryServiceError::NotFound(msg) => ApiError::not_found(msg),
            CategoryServiceError::Conflict(msg) => ApiError::conflict(msg),
            CategoryServiceError::Internal(e) => ApiError::from_internal(e),
        }
    }
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::Validation(msg) => ApiError::validation_error(msg),
            ContentServiceError::NotFound(msg) => ApiError::not_found(msg),
            ContentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ContentServiceError::Conflict(msg) => ApiError::conflict(msg),
            ContentServiceError::Internal(e) => ApiError::from_internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::Validation(msg) => ApiError::validation_error(msg),
            CommentServiceError::NotFound(msg) => ApiError::not_found(msg),
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::Internal(e) => ApiError::from_internal(e),
        }
    }
}

impl From<SocialServiceError> for ApiError {
    fn from(err: SocialServiceError) -> Self {
        match err {
            SocialServiceError::Validation(msg) => ApiError::validation_error(msg),
            SocialServiceError::NotFound(msg) => ApiError::not_found(msg),
            SocialServiceError::Conflict(msg) => ApiError::conflict(msg),
            SocialServiceError::Internal(e) => ApiError::from_internal(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state.user_service.authenticate(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Attaches the user when a valid token is present. Missing or invalid tokens
/// leave the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match extract_bearer_token(&request) {
        Some(token) => state.user_service.authenticate(&token).await.ok(),
        None => None,
    };
    if let Some(user) = user {
        request.extensions_mut().insert(AuthenticatedUser(user));
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_status() {
        let cases = [
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::service_unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::new("SOMETHING_ELSE", "x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err: ApiError = ContentServiceError::Internal(anyhow::anyhow!("connection reset")).into();
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert_eq!(err.error.message, "Internal server error");
    }

    #[test]
    fn test_exhausted_pool_is_service_unavailable() {
        let cause = anyhow::Error::new(sqlx::Error::PoolTimedOut).context("Failed to list content");
        let err: ApiError = ContentServiceError::Internal(cause).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error.code, "SERVICE_UNAVAILABLE");

        let err: ApiError = SocialServiceError::Internal(anyhow::Error::new(sqlx::Error::PoolClosed)).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = UserServiceError::Internal(anyhow::Error::new(sqlx::Error::RowNotFound)).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_pagination_errors_name_the_field() {
        let err: ApiError = PaginationError::InvalidOffset.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error.details, Some(serde_json::json!({"field": "offset"})));
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ApiError::conflict("taken")).unwrap();
        assert_eq!(json, serde_json::json!({"error": {"code": "CONFLICT", "message": "taken"}}));

        let json = serde_json::to_value(ApiError::with_details(
            "VALIDATION_ERROR",
            "bad",
            serde_json::json!({"field": "title"}),
        ))
        .unwrap();
        assert_eq!(json["error"]["details"]["field"], "title");
    }

    #[test]
    fn test_bearer_token_extraction() {
        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request).as_deref(), Some("abc.def.ghi"));

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request), None);

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer ")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&request), None);
    }
}
