//! Follow API endpoints
//!
//! - POST /api/follows, DELETE /api/follows/{user_id}
//! - GET /api/follows/feed - Content from followed accounts
//! - GET /api/follows/{user_id}/followers, GET /api/follows/{user_id}/following

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::common::{JsonBody, PaginationQuery, PathParam, QueryParams};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Content, Follow, FollowInput, PagedResult, PublicProfile};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}/followers", get(list_followers))
        .route("/{user_id}/following", get(list_following))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(follow))
        .route("/feed", get(feed))
        .route("/{user_id}", delete(unfollow))
}

/// POST /api/follows
async fn follow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<FollowInput>,
) -> Result<(StatusCode, Json<Follow>), ApiError> {
    let follow = state.social_service.follow(&user, input.user_id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

/// DELETE /api/follows/{user_id}
async fn unfollow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(user_id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.social_service.unfollow(&user, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/follows/feed
async fn feed(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<Content>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.ranking_service.feed(&user, &params).await?))
}

/// GET /api/follows/{user_id}/followers
async fn list_followers(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<PublicProfile>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.social_service.followers(user_id, &params).await?))
}

/// GET /api/follows/{user_id}/following
async fn list_following(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<PublicProfile>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.social_service.following(user_id, &params).await?))
}
