// AccountService - purge of everything a principal owns, and full account
// deletion on top of it

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::ContentConfig;
use crate::error::AppResult;
use crate::framework::{require_principal, Entity};
use crate::infrastructure::blob_store::BlobStore;
use crate::infrastructure::database::EntityStore;
use crate::infrastructure::security::AuthProvider;
use crate::infrastructure::viewer::{SessionResolver, ViewerContext};
use crate::models::{Comment, Post, Principal, PurgeReport};
use crate::services::post_service::{delete_comments_on_post, release_image};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn EntityStore>,
    sessions: Arc<dyn SessionResolver>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthProvider>,
    content: ContentConfig,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        sessions: Arc<dyn SessionResolver>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthProvider>,
        content: ContentConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            blobs,
            auth,
            content,
        }
    }

    /// Delete every post and every comment the viewer authored. Always acts
    /// on the resolved principal; there is no way to name another account.
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn purge_account_data(&self, vc: &ViewerContext) -> AppResult<PurgeReport> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        self.purge(&principal).await
    }

    /// Purge, then remove the principal from the auth provider, which ends
    /// all of its sessions
    #[instrument(skip(self, vc), fields(request_id = %vc.request_id))]
    pub async fn delete_account(&self, vc: &ViewerContext) -> AppResult<PurgeReport> {
        let principal = require_principal(self.sessions.resolve(vc).await)?;
        let report = self.purge(&principal).await?;
        self.auth.delete_user(principal.id).await?;

        info!(user_id = %principal.id, "account deleted");
        Ok(report)
    }

    // Two independent loops with no rollback: a failure in the second leaves
    // the posts deleted and some comments behind.
    async fn purge(&self, principal: &Principal) -> AppResult<PurgeReport> {
        let store = self.store.as_ref();

        let mut posts_deleted = 0;
        let mut comments_deleted = 0;
        for post in Post::gen_by_author(store, principal.id).await? {
            if Post::delete(store, post.id).await? {
                posts_deleted += 1;
            }
            if self.content.cascade_comments_on_post_delete {
                comments_deleted += delete_comments_on_post(store, post.id).await?;
            }
            if let Some(handle) = &post.image_storage_id {
                release_image(store, self.blobs.as_ref(), handle).await;
            }
        }

        for comment in Comment::gen_by_author(store, principal.id).await? {
            if Comment::delete(store, comment.id).await? {
                comments_deleted += 1;
            }
        }

        info!(
            user_id = %principal.id,
            posts_deleted,
            comments_deleted,
            "account data purged"
        );
        Ok(PurgeReport {
            success: true,
            posts_deleted,
            comments_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, Config};
    use crate::core::BlobHandle;
    use crate::error::AppError;
    use crate::infrastructure::blob_store::LocalBlobStore;
    use crate::infrastructure::security::SessionService;
    use crate::infrastructure::sqlite_database::SqliteEntityStore;
    use crate::infrastructure::viewer::ProviderSessionResolver;
    use crate::models::NewPost;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<SqliteEntityStore>,
        auth: Arc<SessionService>,
        accounts: AccountService,
    }

    async fn fixture(cascade: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = Config::in_memory(dir.path());
        config.content.cascade_comments_on_post_delete = cascade;

        let store = Arc::new(SqliteEntityStore::new_in_memory().await.unwrap());
        let auth = Arc::new(SessionService::new(
            store.clone(),
            AuthConfig {
                session_ttl_secs: 3600,
                password_min_length: 8,
            },
        ));
        let blobs = Arc::new(
            LocalBlobStore::new(&config.storage, &config.server)
                .await
                .unwrap(),
        );
        let sessions = Arc::new(ProviderSessionResolver::new(auth.clone()));
        let accounts = AccountService::new(
            store.clone(),
            sessions,
            blobs,
            auth.clone(),
            config.content,
        );
        Fixture {
            _dir: dir,
            store,
            auth,
            accounts,
        }
    }

    fn post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            body: "body".into(),
            image_storage_id: BlobHandle::new("img").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_purge_requires_auth() {
        let f = fixture(false).await;
        let err = f
            .accounts
            .purge_account_data(&ViewerContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
        let err = f
            .accounts
            .delete_account(&ViewerContext::with_token("stale"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_purge_leaves_other_users_comments() {
        let f = fixture(false).await;
        let a = f.auth.sign_up("A", "a@example.com", "password-a").await.unwrap();
        let b = f.auth.sign_up("B", "b@example.com", "password-b").await.unwrap();
        let store = f.store.as_ref();

        let p1 = Post::create(store, a.principal.id, post("P1")).await.unwrap();
        let c1 = Comment::create(store, p1.id, &b.principal, "C1".into()).await.unwrap();
        Comment::create(store, p1.id, &a.principal, "own".into()).await.unwrap();

        let report = f
            .accounts
            .purge_account_data(&ViewerContext::with_token(a.token.clone()))
            .await
            .unwrap();
        assert_eq!(
            report,
            PurgeReport {
                success: true,
                posts_deleted: 1,
                comments_deleted: 1
            }
        );
        assert!(Post::gen_nullable(store, p1.id).await.unwrap().is_none());
        let orphan = Comment::gen_enforce(store, c1.id).await.unwrap();
        assert_eq!(orphan.post_id, p1.id);
    }

    #[tokio::test]
    async fn test_purge_with_cascade_removes_all_comments_on_own_posts() {
        let f = fixture(true).await;
        let a = f.auth.sign_up("A", "a@example.com", "password-a").await.unwrap();
        let b = f.auth.sign_up("B", "b@example.com", "password-b").await.unwrap();
        let store = f.store.as_ref();

        let p1 = Post::create(store, a.principal.id, post("P1")).await.unwrap();
        Comment::create(store, p1.id, &b.principal, "C1".into()).await.unwrap();

        let report = f
            .accounts
            .purge_account_data(&ViewerContext::with_token(a.token.clone()))
            .await
            .unwrap();
        assert_eq!(report.comments_deleted, 1);
        assert!(Comment::gen_by_post(store, p1.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_account_ends_sessions() {
        let f = fixture(false).await;
        let a = f.auth.sign_up("A", "a@example.com", "password-a").await.unwrap();
        Post::create(f.store.as_ref(), a.principal.id, post("P1")).await.unwrap();

        let vc = ViewerContext::with_token(a.token.clone());
        let report = f.accounts.delete_account(&vc).await.unwrap();
        assert_eq!(report.posts_deleted, 1);

        assert!(f.auth.get_session(&a.token).await.unwrap().is_none());
        let err = f.accounts.purge_account_data(&vc).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }
}
