//! HTTP-level tests driving the full router

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::config::Config;
use crate::db::{create_test_pool, migrations::run_migrations};

async fn test_app() -> Router {
    let pool = create_test_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();
    build_router(AppState::new(pool, &Config::default()), "*")
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Register an account and log it in, returning (user id, token)
async fn register_and_login(app: &Router, username: &str) -> (i64, String) {
    let (status, user) = send(
        app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", user);

    let (status, login) = send(
        app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"login": username, "password": "correct horse battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", login);
    assert_eq!(login["token_type"], "Bearer");

    (
        user["id"].as_i64().unwrap(),
        login["token"].as_str().unwrap().to_string(),
    )
}

async fn create_category(app: &Router, admin_token: &str, name: &str) -> i64 {
    let (status, category) = send(
        app,
        Method::POST,
        "/api/categories",
        Some(admin_token),
        Some(json!({"name": name})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", category);
    category["id"].as_i64().unwrap()
}

async fn create_article(app: &Router, token: &str, category_id: i64, title: &str, status: &str) -> Value {
    let (code, content) = send(
        app,
        Method::POST,
        "/api/contents",
        Some(token),
        Some(json!({
            "title": title,
            "category_id": category_id,
            "content_type": "article",
            "body": format!("All about {}", title),
            "status": status,
        })),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED, "{}", content);
    content
}

#[tokio::test]
async fn test_health_reports_database() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = test_app().await;
    let (admin_id, admin_token) = register_and_login(&app, "alice").await;
    let (_, user_token) = register_and_login(&app, "bob").await;

    let (status, me) = send(&app, Method::GET, "/api/users/me", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], admin_id);
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());

    let (_, me) = send(&app, Method::GET, "/api/users/me", Some(&user_token), None).await;
    assert_eq!(me["role"], "user");

    // Public profiles hide the email address
    let (status, profile) = send(&app, Method::GET, &format!("/api/users/{}", admin_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert!(profile.get("email").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({"username": "alice", "email": "other@example.com", "password": "long enough pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"login": "alice", "password": "wrong password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_authentication_required() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/follows",
        None,
        Some(json!({"user_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_are_gated() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let (user_id, user_token) = register_and_login(&app, "member").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/categories",
        Some(&user_token),
        Some(json!({"name": "Music"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = send(&app, Method::GET, "/api/users", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) = send(&app, Method::GET, "/api/users?limit=1", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let (status, promoted) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}/role", user_id),
        Some(&admin_token),
        Some(json!({"role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "admin");

    // The role is read per request, so the promotion applies immediately
    let (status, _) = send(&app, Method::GET, "/api/users", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_categories_crud() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;

    let parent = create_category(&app, &admin_token, "Video Games").await;
    let (status, child) = send(
        &app,
        Method::POST,
        "/api/categories",
        Some(&admin_token),
        Some(json!({"name": "Retro", "parent_id": parent})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, parent_body) = send(&app, Method::GET, &format!("/api/categories/{}", parent), None, None).await;
    assert_eq!(parent_body["slug"], "video-games");

    let (status, tree) = send(&app, Method::GET, "/api/categories/tree", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree[0]["children"][0]["name"], "Retro");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/categories",
        Some(&admin_token),
        Some(json!({"name": "Video Games"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A category cannot become its own descendant
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/categories/{}", parent),
        Some(&admin_token),
        Some(json!({"parent_id": child["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/categories/{}", child["id"]),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = send(&app, Method::GET, "/api/categories", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_content_lifecycle_and_visibility() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let (_, author_token) = register_and_login(&app, "author").await;
    let (_, reader_token) = register_and_login(&app, "reader").await;
    let category_id = create_category(&app, &admin_token, "Tech").await;

    let draft = create_article(&app, &author_token, category_id, "Rust Ownership", "draft").await;
    let id = draft["id"].as_i64().unwrap();
    assert_eq!(draft["status"], "draft");
    assert_eq!(draft["slug"], "rust-ownership");
    assert!(draft["published_at"].is_null());

    let uri = format!("/api/contents/{}", id);
    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &uri, Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &uri, Some(&author_token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Same title gets a numbered slug
    let second = create_article(&app, &author_token, category_id, "Rust Ownership", "draft").await;
    assert_eq!(second["slug"], "rust-ownership-2");

    let status_uri = format!("/api/contents/{}/status", id);
    let (status, body) = send(
        &app,
        Method::PATCH,
        &status_uri,
        Some(&author_token),
        Some(json!({"status": "archived"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    for next in ["pending", "published"] {
        let (status, body) = send(
            &app,
            Method::PATCH,
            &status_uri,
            Some(&author_token),
            Some(json!({"status": next})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["status"], next);
    }

    let (status, published) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(published["published_at"].is_string());

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&reader_token),
        Some(json!({"title": "Hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin_token),
        Some(json!({"description": "Curated"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Curated");

    let (_, page) = send(
        &app,
        Method::GET,
        &format!("/api/contents?category_id={}&content_type=article", category_id),
        None,
        None,
    )
    .await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id);

    let (_, mine) = send(&app, Method::GET, "/api/users/me/contents", Some(&author_token), None).await;
    assert_eq!(mine["total"], 2);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&author_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_typed_content_validation() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let category_id = create_category(&app, &admin_token, "Clips").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/contents",
        Some(&admin_token),
        Some(json!({"title": "Trailer", "category_id": category_id, "content_type": "video"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, video) = send(
        &app,
        Method::POST,
        "/api/contents",
        Some(&admin_token),
        Some(json!({
            "title": "Trailer",
            "category_id": category_id,
            "content_type": "video",
            "media_url": "https://cdn.example.com/trailer.mp4",
            "duration_seconds": 90,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(video["content_type"], "video");

    // Malformed JSON is reported with the same envelope
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/contents")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_comments_likes_and_bookmarks() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let (_, reader_token) = register_and_login(&app, "reader").await;
    let category_id = create_category(&app, &admin_token, "Podcasts").await;
    let post = create_article(&app, &admin_token, category_id, "Episode One", "published").await;
    let id = post["id"].as_i64().unwrap();

    // Comments
    let (status, root) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(&reader_token),
        Some(json!({"content_id": id, "body": "Great episode"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(&admin_token),
        Some(json!({"content_id": id, "parent_id": root["id"], "body": "Thanks!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tree) = send(&app, Method::GET, &format!("/api/comments/content/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree[0]["replies"][0]["body"], "Thanks!");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/comments/{}", root["id"]),
        Some(&admin_token),
        Some(json!({"body": "Edited by admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Likes
    let (status, summary) = send(
        &app,
        Method::POST,
        "/api/ratings",
        Some(&reader_token),
        Some(json!({"content_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(summary["like_count"], 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/ratings",
        Some(&reader_token),
        Some(json!({"content_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let summary_uri = format!("/api/ratings/content/{}", id);
    let (_, mine) = send(&app, Method::GET, &summary_uri, Some(&reader_token), None).await;
    assert_eq!(mine["liked_by_me"], true);
    let (_, anonymous) = send(&app, Method::GET, &summary_uri, None, None).await;
    assert_eq!(anonymous["liked_by_me"], false);
    assert_eq!(anonymous["like_count"], 1);

    let (_, liked) = send(&app, Method::GET, "/api/ratings/me", Some(&reader_token), None).await;
    assert_eq!(liked["items"][0]["id"], id);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/ratings/{}", id), Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/ratings/{}", id), Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bookmarks
    let bookmark_uri = format!("/api/contents/{}/bookmark", id);
    let (status, _) = send(&app, Method::POST, &bookmark_uri, Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, &bookmark_uri, Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, bookmarks) = send(&app, Method::GET, "/api/users/me/bookmarks", Some(&reader_token), None).await;
    assert_eq!(bookmarks["total"], 1);

    let (status, _) = send(&app, Method::DELETE, &bookmark_uri, Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_follows_feed_and_stats() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let (author_id, author_token) = register_and_login(&app, "creator").await;
    let (fan_id, fan_token) = register_and_login(&app, "fan").await;
    let category_id = create_category(&app, &admin_token, "Art").await;
    create_article(&app, &author_token, category_id, "Sketchbook", "published").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/follows",
        Some(&fan_token),
        Some(json!({"user_id": fan_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, follow) = send(
        &app,
        Method::POST,
        "/api/follows",
        Some(&fan_token),
        Some(json!({"user_id": author_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(follow["following_id"], author_id);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/follows",
        Some(&fan_token),
        Some(json!({"user_id": author_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::POST, "/api/contents/stats/refresh", Some(&fan_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::POST, "/api/contents/stats/refresh", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, feed) = send(&app, Method::GET, "/api/follows/feed", Some(&fan_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["total"], 1);
    assert_eq!(feed["items"][0]["title"], "Sketchbook");

    let (_, followers) = send(&app, Method::GET, &format!("/api/follows/{}/followers", author_id), None, None).await;
    assert_eq!(followers["items"][0]["username"], "fan");
    let (_, following) = send(&app, Method::GET, &format!("/api/follows/{}/following", fan_id), None, None).await;
    assert_eq!(following["items"][0]["username"], "creator");

    let (_, stats) = send(&app, Method::GET, &format!("/api/users/{}/stats", author_id), None, None).await;
    assert_eq!(stats["follower_count"], 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/follows/{}", author_id), Some(&fan_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_search_trending_and_pagination() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let category_id = create_category(&app, &admin_token, "Docs").await;
    create_article(&app, &admin_token, category_id, "Async Rust", "published").await;
    create_article(&app, &admin_token, category_id, "Gardening Basics", "published").await;

    let (status, body) = send(&app, Method::GET, "/api/contents/search?q=", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, hits) = send(&app, Method::GET, "/api/contents/search?q=rust", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits["total"], 1);
    assert_eq!(hits["items"][0]["title"], "Async Rust");
    assert!(hits["items"][0]["score"].as_f64().unwrap() > 0.0);

    let (status, trending) = send(&app, Method::GET, "/api/contents/trending?limit=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trending["total"], 2);
    assert_eq!(trending["limit"], 1);
    assert_eq!(trending["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/api/contents?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::GET, "/api/contents?offset=-5", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = send(&app, Method::GET, "/api/contents?limit=1000", None, None).await;
    assert_eq!(page["limit"], 100);
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn test_malformed_query_and_path_use_error_envelope() {
    let app = test_app().await;
    let (_, token) = register_and_login(&app, "admin").await;

    for uri in [
        "/api/contents?limit=abc",
        "/api/contents?limit=99999999999999999999",
        "/api/contents?content_type=podcast",
        "/api/contents/notanumber",
        "/api/follows/abc/followers",
        "/api/users/me/bookmarks?offset=x",
    ] {
        let (status, body) = send(&app, Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{}", uri);
        assert!(body["error"]["message"].as_str().is_some(), "{}", uri);
    }

    let (status, body) = send(&app, Method::DELETE, "/api/follows/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_account_deletion() {
    let app = test_app().await;
    let (_, admin_token) = register_and_login(&app, "admin").await;
    let (user_id, user_token) = register_and_login(&app, "leaver").await;
    let (other_id, _) = register_and_login(&app, "stayer").await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", other_id), Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", user_id), Some(&user_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Tokens of deleted accounts stop working
    let (status, _) = send(&app, Method::GET, "/api/users/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", other_id), Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
