// CommentService - public comment listing and author-only comment writes

use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::{CommentId, PostId};
use crate::error::{AppError, AppResult};
use crate::framework::{require_owner, require_principal, Entity, PrivacyOperation};
use crate::infrastructure::database::EntityStore;
use crate::infrastructure::viewer::{SessionResolver, ViewerContext};
use crate::models::{validate_comment_body, Comment, Post};

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn EntityStore>,
    sessions: Arc<dyn SessionResolver>,
}

impl CommentService {
    pub fn new(store: Arc<dyn EntityStore>, sessions: Arc<dyn SessionResolver>) -> Self {
        Self { store, sessions }
    }

    /// Comments on `post_id`, newest first. Orphans of a deleted post are
    /// still listed.
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn list_comments_by_post(
        &self,
        vc: &ViewerContext,
        post_id: PostId,
    ) -> AppResult<Vec<Comment>> {
        Comment::gen_by_post(self.store.as_ref(), post_id).await
    }

    #[instrument(skip(self, vc, body), fields(request_id = %vc.request_id))]
    pub async fn create_comment(
        &self,
        vc: &ViewerContext,
        post_id: PostId,
        body: &str,
    ) -> AppResult<CommentId> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        let body = validate_comment_body(body)?;
        Post::gen_enforce(self.store.as_ref(), post_id).await?;

        let comment = Comment::create(self.store.as_ref(), post_id, &principal, body).await?;
        info!(comment_id = %comment.id, post_id = %post_id, "comment created");
        Ok(comment.id)
    }

    /// Author-only; replaces the body and nothing else
    #[instrument(skip(self, vc, body), fields(request_id = %vc.request_id))]
    pub async fn update_comment(
        &self,
        vc: &ViewerContext,
        id: CommentId,
        body: &str,
    ) -> AppResult<()> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        let comment = Comment::gen_enforce(self.store.as_ref(), id).await?;
        require_owner(&principal, &comment, PrivacyOperation::Update)?;

        let body = validate_comment_body(body)?;
        if !Comment::set_body(self.store.as_ref(), id, body).await? {
            // Deleted between the ownership check and the write
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Author-only; a second delete of the same id is `NotFound`
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn delete_comment(&self, vc: &ViewerContext, id: CommentId) -> AppResult<()> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        let comment = Comment::gen_enforce(self.store.as_ref(), id).await?;
        require_owner(&principal, &comment, PrivacyOperation::Delete)?;

        if !Comment::delete(self.store.as_ref(), id).await? {
            return Err(not_found(id));
        }
        info!(comment_id = %id, "comment deleted");
        Ok(())
    }
}

fn not_found(id: CommentId) -> AppError {
    AppError::NotFound(format!("Comment {} not found", id))
}
