// PostService - public post reads, authenticated post writes and the
// viewer's own profile/post count

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::ContentConfig;
use crate::core::{BlobHandle, PostId};
use crate::error::{AppError, AppResult};
use crate::framework::{require_owner, require_principal, Entity, PrivacyOperation};
use crate::infrastructure::blob_store::BlobStore;
use crate::infrastructure::database::EntityStore;
use crate::infrastructure::viewer::{SessionResolver, ViewerContext};
use crate::models::{Comment, NewPost, Post, PostView, ProfileView, UploadUrl};

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn EntityStore>,
    sessions: Arc<dyn SessionResolver>,
    blobs: Arc<dyn BlobStore>,
    content: ContentConfig,
}

impl PostService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        sessions: Arc<dyn SessionResolver>,
        blobs: Arc<dyn BlobStore>,
        content: ContentConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            blobs,
            content,
        }
    }

    #[instrument(skip(self, vc, new_post), fields(request_id = %vc.request_id))]
    pub async fn create_post(&self, vc: &ViewerContext, new_post: NewPost) -> AppResult<PostId> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        let new_post = new_post.validated()?;

        let post = Post::create(self.store.as_ref(), principal.id, new_post).await?;
        info!(post_id = %post.id, author_id = %principal.id, "post created");
        Ok(post.id)
    }

    /// Every post, newest first, with image URLs resolved
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn list_posts(&self, vc: &ViewerContext) -> AppResult<Vec<PostView>> {
        let posts = Post::gen_all(self.store.as_ref()).await?;
        try_join_all(posts.into_iter().map(|post| self.with_image_url(post))).await
    }

    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn get_post_by_id(&self, vc: &ViewerContext, id: PostId) -> AppResult<PostView> {
        let post = Post::gen_enforce(self.store.as_ref(), id).await?;
        self.with_image_url(post).await
    }

    /// 0 for anonymous viewers rather than an error
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn get_user_posts_count(&self, vc: &ViewerContext) -> AppResult<u64> {
        match self.sessions.resolve(vc).await {
            Some(principal) => Post::count_by_author(self.store.as_ref(), principal.id).await,
            None => Ok(0),
        }
    }

    /// `None` for anonymous viewers rather than an error
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn get_user_profile(&self, vc: &ViewerContext) -> AppResult<Option<ProfileView>> {
        Ok(self
            .sessions
            .resolve(vc)
            .await
            .map(|principal| ProfileView::from(&principal)))
    }

    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn request_upload_handle(&self, vc: &ViewerContext) -> AppResult<UploadUrl> {
        require_principal(self.sessions.resolve(vc).await)?;
        self.blobs.generate_upload_url().await
    }

    /// Owner-only. Comments on the post are kept unless cascading is enabled.
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn delete_post(&self, vc: &ViewerContext, id: PostId) -> AppResult<()> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        let post = Post::gen_enforce(self.store.as_ref(), id).await?;
        require_owner(&principal, &post, PrivacyOperation::Delete)?;

        // Lost a race with another delete of the same post
        if !Post::delete(self.store.as_ref(), id).await? {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }
        let comments_deleted = if self.content.cascade_comments_on_post_delete {
            delete_comments_on_post(self.store.as_ref(), id).await?
        } else {
            0
        };
        if let Some(handle) = &post.image_storage_id {
            release_image(self.store.as_ref(), self.blobs.as_ref(), handle).await;
        }

        info!(post_id = %id, comments_deleted, "post deleted");
        Ok(())
    }

    async fn with_image_url(&self, post: Post) -> AppResult<PostView> {
        let image_url = match &post.image_storage_id {
            Some(handle) => self.blobs.get_url(handle).await?,
            None => None,
        };
        Ok(PostView { post, image_url })
    }
}

/// Remove every comment attached to `post_id`, whoever wrote it
pub(crate) async fn delete_comments_on_post(
    store: &dyn EntityStore,
    post_id: PostId,
) -> AppResult<u64> {
    let mut deleted = 0;
    for comment in Comment::gen_by_post(store, post_id).await? {
        if Comment::delete(store, comment.id).await? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Delete the blob behind `handle` once no remaining post shows it. Handles
/// are public, so another post may carry the same one. The referencing post
/// is already gone; a failure here only leaves a stray file.
pub(crate) async fn release_image(store: &dyn EntityStore, blobs: &dyn BlobStore, handle: &BlobHandle) {
    match Post::count_by_image(store, handle).await {
        Ok(0) => {
            if let Err(e) = blobs.delete(handle).await {
                warn!(handle = %handle, "failed to delete image blob: {}", e);
            }
        }
        Ok(remaining) => debug!(handle = %handle, remaining, "image still in use, keeping blob"),
        Err(e) => warn!(handle = %handle, "could not count image references, keeping blob: {}", e),
    }
}
