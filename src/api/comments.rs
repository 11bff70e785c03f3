//! Comment API endpoints
//!
//! - GET /api/comments/content/{content_id} - Threaded comments
//! - GET /api/comments/{id}
//! - POST /api/comments, PUT|DELETE /api/comments/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::{JsonBody, PathParam};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Comment, CommentNode, CreateCommentInput, UpdateCommentInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/content/{content_id}", get(list_comments))
        .route("/{id}", get(get_comment))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_comment))
        .route("/{id}", put(update_comment).delete(delete_comment))
}

/// GET /api/comments/content/{content_id}
async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    PathParam(content_id): PathParam<i64>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
    let viewer = viewer.map(|AuthenticatedUser(user)| user);
    let tree = state
        .comment_service
        .list_for_content(viewer.as_ref(), content_id)
        .await?;
    Ok(Json(tree))
}

/// GET /api/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Comment>, ApiError> {
    let viewer = viewer.map(|AuthenticatedUser(user)| user);
    Ok(Json(state.comment_service.get(viewer.as_ref(), id).await?))
}

/// POST /api/comments
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<CreateCommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.comment_service.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
    JsonBody(input): JsonBody<UpdateCommentInput>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.update(&user, id, &input.body).await?))
}

/// DELETE /api/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
