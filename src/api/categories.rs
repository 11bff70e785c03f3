//! Category API endpoints
//!
//! Handles HTTP requests for category management:
//! - GET /api/categories - Flat category list
//! - GET /api/categories/tree - Nested category tree
//! - GET /api/categories/{id} - Single category
//! - POST /api/categories, PUT|DELETE /api/categories/{id} (admin)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::{JsonBody, PathParam};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};

/// Build the public categories router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/tree", get(get_category_tree))
        .route("/{id}", get(get_category))
}

/// Build the admin categories router
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

/// GET /api/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list().await?))
}

/// GET /api/categories/tree
async fn get_category_tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryTree>>, ApiError> {
    Ok(Json(state.category_service.list_tree().await?))
}

/// GET /api/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get_by_id(id).await?))
}

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(input): JsonBody<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, input).await?))
}

/// DELETE /api/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
