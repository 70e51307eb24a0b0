// Blog HTTP interface - JSON over HTTP for the post, comment, account,
// auth and storage operations

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path as AxumPath, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::{json, Value};
use std::str::FromStr;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    app_state::AppState,
    core::{BlobHandle, CommentId, PostId},
    error::{AppError, AppResult},
    framework::require_principal,
    infrastructure::{
        blob_store::BlobStore,
        middleware::{viewer_context_middleware, AppJson, Vc},
        security::AuthProvider,
    },
    models::{
        ChangePasswordRequest, Comment, CommentBody, NewPost, PostView, Principal, ProfileView,
        PurgeReport, Session, SignInRequest, SignUpRequest, StoredBlob, UpdateNameRequest,
        UploadUrl,
    },
};

fn parse_path<T: FromStr>(raw: &str, what: &str) -> AppResult<T> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid {}: {:?}", what, raw)))
}

fn created(id: impl ToString) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": id.to_string() })))
}

async fn current_principal(state: &AppState, vc: &Vc) -> AppResult<Principal> {
    require_principal(state.sessions.resolve(vc).await)
}

// Auth handlers

pub async fn sign_up_handler(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignUpRequest>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let session = state.auth.sign_up(&req.name, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn sign_in_handler(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignInRequest>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.auth.sign_in(&req.email, &req.password).await?))
}

pub async fn sign_out_handler(State(state): State<AppState>, vc: Vc) -> AppResult<StatusCode> {
    if let Some(token) = vc.session_token.as_deref() {
        state.auth.sign_out(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Json<Option<Principal>> {
    Json(state.sessions.resolve(&vc).await)
}

pub async fn update_name_handler(
    State(state): State<AppState>,
    vc: Vc,
    AppJson(req): AppJson<UpdateNameRequest>,
) -> AppResult<Json<ProfileView>> {
    let principal = current_principal(&state, &vc).await?;
    let updated = state.auth.update_name(principal.id, &req.name).await?;
    Ok(Json(ProfileView::from(&updated)))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    vc: Vc,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let principal = current_principal(&state, &vc).await?;
    state
        .auth
        .change_password(principal.id, &req.current_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Post handlers

pub async fn list_posts_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.post_service.list_posts(&vc).await?))
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    AppJson(req): AppJson<NewPost>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = state.post_service.create_post(&vc, req).await?;
    Ok(created(id))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Json<PostView>> {
    let id: PostId = parse_path(&id, "post id")?;
    Ok(Json(state.post_service.get_post_by_id(&vc, id).await?))
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<StatusCode> {
    let id: PostId = parse_path(&id, "post id")?;
    state.post_service.delete_post(&vc, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Comment handlers

pub async fn list_comments_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(post_id): AxumPath<String>,
) -> AppResult<Json<Vec<Comment>>> {
    let post_id: PostId = parse_path(&post_id, "post id")?;
    Ok(Json(
        state.comment_service.list_comments_by_post(&vc, post_id).await?,
    ))
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(post_id): AxumPath<String>,
    AppJson(req): AppJson<CommentBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let post_id: PostId = parse_path(&post_id, "post id")?;
    let id = state
        .comment_service
        .create_comment(&vc, post_id, &req.body)
        .await?;
    Ok(created(id))
}

pub async fn update_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
    AppJson(req): AppJson<CommentBody>,
) -> AppResult<StatusCode> {
    let id: CommentId = parse_path(&id, "comment id")?;
    state.comment_service.update_comment(&vc, id, &req.body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<String>,
) -> AppResult<StatusCode> {
    let id: CommentId = parse_path(&id, "comment id")?;
    state.comment_service.delete_comment(&vc, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Viewer ("me") handlers

pub async fn get_profile_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Option<ProfileView>>> {
    Ok(Json(state.post_service.get_user_profile(&vc).await?))
}

pub async fn get_posts_count_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Value>> {
    let count = state.post_service.get_user_posts_count(&vc).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn purge_data_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<PurgeReport>> {
    Ok(Json(state.account_service.purge_account_data(&vc).await?))
}

pub async fn delete_account_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<PurgeReport>> {
    Ok(Json(state.account_service.delete_account(&vc).await?))
}

// Storage handlers

pub async fn upload_url_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<UploadUrl>> {
    Ok(Json(state.post_service.request_upload_handle(&vc).await?))
}

/// The token in the URL is the credential; no session is needed
pub async fn upload_handler(
    State(state): State<AppState>,
    AxumPath(token): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<StoredBlob>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let storage_id = state
        .blobs
        .store(&token, body.to_vec(), content_type)
        .await?;
    Ok((StatusCode::CREATED, Json(StoredBlob { storage_id })))
}

pub async fn download_handler(
    State(state): State<AppState>,
    AxumPath(handle): AxumPath<String>,
) -> AppResult<Response> {
    let handle: BlobHandle = parse_path(&handle, "storage id")?;
    let content = state
        .blobs
        .read(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", handle)))?;

    Ok((
        [
            (header::CONTENT_TYPE, content.content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        content.bytes,
    )
        .into_response())
}

pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.store.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

// Create blog router
pub fn create_blog_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.storage.max_upload_bytes;

    let api = Router::new()
        // Auth
        .route("/auth/sign-up", post(sign_up_handler))
        .route("/auth/sign-in", post(sign_in_handler))
        .route("/auth/sign-out", post(sign_out_handler))
        .route("/auth/session", get(get_session_handler))
        .route("/auth/user", patch(update_name_handler))
        .route("/auth/change-password", post(change_password_handler))
        // Posts
        .route("/posts", get(list_posts_handler).post(create_post_handler))
        .route("/posts/{id}", get(get_post_handler).delete(delete_post_handler))
        .route(
            "/posts/{id}/comments",
            get(list_comments_handler).post(create_comment_handler),
        )
        // Comments
        .route(
            "/comments/{id}",
            patch(update_comment_handler).delete(delete_comment_handler),
        )
        // Viewer
        .route("/me", delete(delete_account_handler))
        .route("/me/profile", get(get_profile_handler))
        .route("/me/posts/count", get(get_posts_count_handler))
        .route("/me/data", delete(purge_data_handler))
        // Storage
        .route("/storage/upload-url", post(upload_url_handler))
        .route("/storage/upload/{token}", post(upload_handler))
        .route("/storage/files/{handle}", get(download_handler));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(viewer_context_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
