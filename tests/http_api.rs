use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use inkpost::{
    app_state::AppState,
    blog_interface::create_blog_router,
    config::Config,
    infrastructure::{
        blob_store::LocalBlobStore, security::SessionService, sqlite_database::SqliteEntityStore,
    },
};

struct TestApp {
    _dir: TempDir,
    router: Router,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = Config::in_memory(dir.path());
    let store = Arc::new(SqliteEntityStore::new_in_memory().await.unwrap());
    let auth = SessionService::new(store.clone(), config.auth.clone());
    let blobs = LocalBlobStore::new(&config.storage, &config.server).await.unwrap();
    let state = AppState::from_parts(config, store, Arc::new(auth), Arc::new(blobs));
    TestApp {
        _dir: dir,
        router: create_blog_router(state),
    }
}

impl TestApp {
    async fn send(
        &self,
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

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn sign_up(&self, name: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/sign-up",
                None,
                Some(json!({
                    "name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                    "password": "correct horse"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_post(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/posts",
                Some(token),
                Some(json!({"title": title, "body": "text", "imageStorageId": "cover"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn anonymous_soft_reads_and_rejected_writes() {
    let app = test_app().await;

    let (status, body) = app.send(Method::GET, "/api/v1/me/posts/count", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"count": 0}));

    let (status, body) = app.send(Method::GET, "/api/v1/me/profile", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            None,
            Some(json!({"title": "t", "body": "b", "imageStorageId": "cover"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, _) = app.send(Method::DELETE, "/api/v1/me/data", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::POST, "/api/v1/storage/upload-url", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn post_and_comment_lifecycle() {
    let app = test_app().await;
    let alice = app.sign_up("Alice").await;
    let bob = app.sign_up("Bob").await;

    let post_id = app.create_post(&alice, "First").await;

    let (status, posts) = app.send(Method::GET, "/api/v1/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["id"], post_id.as_str());
    assert_eq!(posts[0]["title"], "First");
    assert_eq!(posts[0]["imageUrl"], Value::Null);

    let comments_uri = format!("/api/v1/posts/{}/comments", post_id);
    let (status, created) = app
        .send(Method::POST, &comments_uri, Some(&bob), Some(json!({"body": "hello"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_uri = format!("/api/v1/comments/{}", created["id"].as_str().unwrap());

    let (_, comments) = app.send(Method::GET, &comments_uri, None, None).await;
    assert_eq!(comments[0]["body"], "hello");
    assert_eq!(comments[0]["authorName"], "Bob");
    assert_eq!(comments[0]["postId"], post_id.as_str());

    let (status, body) = app
        .send(Method::PATCH, &comment_uri, Some(&alice), Some(json!({"body": "nope"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, _) = app
        .send(Method::PATCH, &comment_uri, Some(&bob), Some(json!({"body": "edited"})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, comments) = app.send(Method::GET, &comments_uri, None, None).await;
    assert_eq!(comments[0]["body"], "edited");

    let (status, _) = app.send(Method::DELETE, &comment_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.send(Method::DELETE, &comment_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (_, count) = app.send(Method::GET, "/api/v1/me/posts/count", Some(&alice), None).await;
    assert_eq!(count, json!({"count": 1}));
}

#[tokio::test]
async fn invalid_input_is_a_validation_error() {
    let app = test_app().await;
    let alice = app.sign_up("Alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            Some(&alice),
            Some(json!({"title": "   ", "body": "b", "imageStorageId": "cover"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = app.send(Method::GET, "/api/v1/posts/not-a-number", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(Method::GET, "/api/v1/posts/42", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Post 42 not found");
}

#[tokio::test]
async fn undecodable_bodies_are_validation_errors() {
    let app = test_app().await;
    let alice = app.sign_up("Alice").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            Some(&alice),
            Some(json!({"title": "t", "body": "b", "imageStorageId": "../etc"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/sign-in",
            None,
            Some(json!({"email": "alice@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/posts")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn auth_session_flow() {
    let app = test_app().await;
    let token = app.sign_up("Grace").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/sign-up",
            None,
            Some(json!({"name": "Other", "email": "GRACE@example.com", "password": "long enough"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = app.send(Method::GET, "/api/v1/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Grace");

    let (status, profile) = app
        .send(Method::PATCH, "/api/v1/auth/user", Some(&token), Some(json!({"name": "Grace H"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Grace H");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/sign-in",
            None,
            Some(json!({"email": "grace@example.com", "password": "wrong password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::POST, "/api/v1/auth/sign-out", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.send(Method::GET, "/api/v1/auth/session", Some(&token), None).await;
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn malformed_authorization_header_is_rejected() {
    let app = test_app().await;
    let request = Request::builder()
        .uri("/api/v1/posts")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_then_download() {
    let app = test_app().await;
    let alice = app.sign_up("Alice").await;

    let (status, upload) = app
        .send(Method::POST, "/api/v1/storage/upload-url", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let upload_url = upload["uploadUrl"].as_str().unwrap();
    let upload_path = upload_url.trim_start_matches("http://localhost:3000");

    let request = Request::builder()
        .method(Method::POST)
        .uri(upload_path)
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![1u8, 2, 3, 4]))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let stored: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    let storage_id = stored["storageId"].as_str().unwrap().to_string();

    // One-time token
    let request = Request::builder()
        .method(Method::POST)
        .uri(upload_path)
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![5u8]))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, created) = app
        .send(
            Method::POST,
            "/api/v1/posts",
            Some(&alice),
            Some(json!({"title": "Pic", "body": "b", "imageStorageId": storage_id})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, post) = app
        .send(Method::GET, &format!("/api/v1/posts/{}", created["id"].as_str().unwrap()), None, None)
        .await;
    let image_url = post["imageUrl"].as_str().unwrap();
    let file_path = image_url.trim_start_matches("http://localhost:3000");
    assert_eq!(file_path, format!("/api/v1/storage/files/{}", storage_id));

    let request = Request::builder().uri(file_path).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &[1u8, 2, 3, 4]);
}

#[tokio::test]
async fn purge_and_delete_account() {
    let app = test_app().await;
    let a = app.sign_up("A").await;
    let b = app.sign_up("B").await;

    let post_id = app.create_post(&a, "P1").await;
    let comments_uri = format!("/api/v1/posts/{}/comments", post_id);
    app.send(Method::POST, &comments_uri, Some(&b), Some(json!({"body": "C1"})))
        .await;

    let (status, report) = app.send(Method::DELETE, "/api/v1/me/data", Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        report,
        json!({"success": true, "postsDeleted": 1, "commentsDeleted": 0})
    );

    let (_, orphans) = app.send(Method::GET, &comments_uri, None, None).await;
    assert_eq!(orphans.as_array().unwrap().len(), 1);

    let (status, _) = app.send(Method::DELETE, "/api/v1/me", Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::DELETE, "/api/v1/me/data", Some(&a), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
