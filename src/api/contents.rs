//! Content API endpoints
//!
//! Handles HTTP requests for content items:
//! - GET /api/contents - Published content with filters
//! - GET /api/contents/search?q= - Relevance-ranked search
//! - GET /api/contents/trending - Trending content
//! - GET /api/contents/{id} - Single item (drafts visible to owner/admin)
//! - POST /api/contents, PUT|DELETE /api/contents/{id}
//! - PATCH /api/contents/{id}/status
//! - POST|DELETE /api/contents/{id}/bookmark
//! - POST /api/contents/stats/refresh (admin)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{JsonBody, PaginationQuery, PathParam, QueryParams};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Bookmark, Content, ContentFilter, ContentStatus, ContentType, CreateContentInput, ListParams,
    PagedResult, SearchHit, TrendingContent, UpdateContentInput,
};

/// Query parameters for listing content
#[derive(Debug, Default, Deserialize)]
pub struct ListContentsQuery {
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub content_type: Option<ContentType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: ContentStatus,
}

/// Build the public contents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contents))
        .route("/search", get(search_contents))
        .route("/trending", get(trending_contents))
        .route("/{id}", get(get_content))
}

/// Routes for authenticated users
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_content))
        .route("/{id}", put(update_content).delete(delete_content))
        .route("/{id}/status", patch(change_status))
        .route("/{id}/bookmark", post(bookmark_content).delete(remove_bookmark))
}

/// Routes for administrators
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/stats/refresh", post(refresh_stats))
}

/// GET /api/contents
async fn list_contents(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListContentsQuery>,
) -> Result<Json<PagedResult<Content>>, ApiError> {
    let params = ListParams::new(query.limit, query.offset)?;
    let filter = ContentFilter {
        category_id: query.category_id,
        author_id: query.author_id,
        content_type: query.content_type,
    };
    Ok(Json(state.content_service.list(&filter, &params).await?))
}

/// GET /api/contents/search?q=
async fn search_contents(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<PagedResult<SearchHit>>, ApiError> {
    let params = ListParams::new(query.limit, query.offset)?;
    Ok(Json(state.ranking_service.search(&query.q, &params).await?))
}

/// GET /api/contents/trending
async fn trending_contents(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<TrendingContent>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.ranking_service.trending(&params).await?))
}

/// GET /api/contents/{id}
async fn get_content(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Content>, ApiError> {
    let viewer = viewer.map(|AuthenticatedUser(user)| user);
    Ok(Json(state.content_service.get(viewer.as_ref(), id).await?))
}

/// POST /api/contents
async fn create_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<CreateContentInput>,
) -> Result<(StatusCode, Json<Content>), ApiError> {
    let content = state.content_service.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(content)))
}

/// PUT /api/contents/{id}
async fn update_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
    JsonBody(input): JsonBody<UpdateContentInput>,
) -> Result<Json<Content>, ApiError> {
    Ok(Json(state.content_service.update(&user, id, input).await?))
}

/// PATCH /api/contents/{id}/status
async fn change_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<ChangeStatusRequest>,
) -> Result<Json<Content>, ApiError> {
    Ok(Json(state.content_service.change_status(&user, id, body.status).await?))
}

/// DELETE /api/contents/{id}
async fn delete_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.content_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/contents/{id}/bookmark
async fn bookmark_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
) -> Result<(StatusCode, Json<Bookmark>), ApiError> {
    let bookmark = state.social_service.bookmark(&user, id).await?;
    Ok((StatusCode::CREATED, Json(bookmark)))
}

/// DELETE /api/contents/{id}/bookmark
async fn remove_bookmark(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.social_service.remove_bookmark(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/contents/stats/refresh
async fn refresh_stats(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.ranking_service.refresh_stats().await?;
    tracing::info!("Statistics refreshed on demand");
    Ok(StatusCode::NO_CONTENT)
}
