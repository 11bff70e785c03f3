//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the mediapress backend.
//! It includes:
//! - User/Auth API endpoints
//! - Category API endpoints
//! - Content API endpoints (listing, search, trending, bookmarks)
//! - Comment API endpoints
//! - Rating and follow API endpoints
//! - Health check

pub mod categories;
pub mod comments;
pub mod common;
pub mod contents;
pub mod follows;
pub mod health;
pub mod middleware;
pub mod ratings;
pub mod users;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/users", users::admin_router())
        .nest("/categories", categories::admin_router())
        .nest("/contents", contents::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/users", users::protected_router())
        .nest("/contents", contents::protected_router())
        .nest("/comments", comments::protected_router())
        .nest("/ratings", ratings::protected_router())
        .nest("/follows", follows::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; a valid token is attached when present
    let public_routes = Router::new()
        .nest("/users", users::public_router())
        .nest("/categories", categories::router())
        .nest("/contents", contents::router())
        .nest("/comments", comments::router())
        .nest("/ratings", ratings::router())
        .nest("/follows", follows::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    public_routes.merge(protected_routes).merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api", build_api_router(state.clone()))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin == "*" {
        return cors.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}, cross-origin requests are disabled", origin);
            cors
        }
    }
}
