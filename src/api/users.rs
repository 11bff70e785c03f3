//! User API endpoints
//!
//! Handles HTTP requests for accounts:
//! - POST /api/users/register, POST /api/users/login
//! - GET|PUT /api/users/me, GET|PUT /api/users/me/settings
//! - GET /api/users/me/bookmarks, GET /api/users/me/contents
//! - GET /api/users (admin), PUT /api/users/{id}/role (admin)
//! - GET /api/users/{id}, GET /api/users/{id}/stats, DELETE /api/users/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{JsonBody, PaginationQuery, PathParam, QueryParams};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Content, LoginInput, PagedResult, PublicProfile, RegisterInput, UpdateProfileInput,
    UpdateSettingsInput, User, UserRole, UserSettings, UserStats,
};

/// Response for a successful login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

/// Routes that need no authentication
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/{id}", get(get_user))
        .route("/{id}/stats", get(get_user_stats))
}

/// Routes for any authenticated user
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/settings", get(get_settings).put(update_settings))
        .route("/me/bookmarks", get(list_my_bookmarks))
        .route("/me/contents", get(list_my_contents))
        .route("/{id}", delete(delete_user))
}

/// Routes for administrators
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}/role", put(set_role))
}

/// POST /api/users/register
async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.register(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/users/login
async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (user, token) = state.user_service.login(input).await?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.user_service.token_ttl_seconds(),
        user,
    }))
}

/// GET /api/users/me
async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

/// PUT /api/users/me
async fn update_me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<UpdateProfileInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update_profile(&user, input).await?))
}

/// GET /api/users/me/settings
async fn get_settings(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.user_service.get_settings(user.id).await?))
}

/// PUT /api/users/me/settings
async fn update_settings(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    JsonBody(input): JsonBody<UpdateSettingsInput>,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.user_service.update_settings(user.id, input).await?))
}

/// GET /api/users/me/bookmarks
async fn list_my_bookmarks(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<Content>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.social_service.list_bookmarks(&user, &params).await?))
}

/// GET /api/users/me/contents - own content in every status
async fn list_my_contents(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<Content>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.content_service.list_mine(&user, &params).await?))
}

/// GET /api/users
async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    let params = query.params()?;
    Ok(Json(state.user_service.list(&admin, &params).await?))
}

/// GET /api/users/{id} - public profile
async fn get_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PublicProfile>, ApiError> {
    let user = state.user_service.get_by_id(id).await?;
    Ok(Json(PublicProfile::from(user)))
}

/// GET /api/users/{id}/stats
async fn get_user_stats(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(state.social_service.stats(id).await?))
}

/// PUT /api/users/{id}/role
async fn set_role(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<SetRoleRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.set_role(&admin, id, body.role).await?))
}

/// DELETE /api/users/{id} - self or admin
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
