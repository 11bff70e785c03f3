//! Rating ("like") API endpoints
//!
//! - POST /api/ratings - Like a content item
//! - DELETE /api/ratings/{content_id} - Remove a like
//! - GET /api/ratings/content/{content_id} - Like count and caller's state
//! - GET /api/ratings/me - Content the caller liked

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::common::{JsonBody, PaginationQuery, PathParam, QueryParams};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Content, LikeInput, LikeSummary, PagedResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/content/{content_id}", get(get_summary))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(like))
        .route("/me", get(list_liked))
        .route("/{content_id}", delete(unlike))
}

/// POST /api/ratings
async fn like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<LikeInput>,
) -> Result<(StatusCode, Json<LikeSummary>), ApiError> {
    let summary = state.social_service.like(&user, input.content_id).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// DELETE /api/ratings/{content_id}
async fn unlike(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(content_id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.social_service.unlike(&user, content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/ratings/content/{content_id}
async fn get_summary(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    PathParam(content_id): PathParam<i64>,
) -> Result<Json<LikeSummary>, ApiError> {
    let viewer = viewer.map(|AuthenticatedUser(user)| user);
    Ok(Json(state.social_service.summary(viewer.as_ref(), content_id).await?))
}

/// GET /api/ratings/me
async fn list_liked(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<Content>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.social_service.list_liked(&user, &params).await?))
}
