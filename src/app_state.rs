use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::{
        blob_store::LocalBlobStore,
        database::EntityStore,
        security::SessionService,
        sqlite_database::SqliteEntityStore,
        viewer::{ProviderSessionResolver, SessionResolver},
    },
    services::{AccountService, CommentService, PostService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EntityStore>,
    pub auth: Arc<SessionService>,
    pub blobs: Arc<LocalBlobStore>,
    pub sessions: Arc<dyn SessionResolver>,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub account_service: AccountService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Connect and create the schema
        let store = SqliteEntityStore::connect(
            &config.database.url,
            config.database.max_connections,
        )
        .await?;
        let store: Arc<dyn EntityStore> = Arc::new(store);

        let blobs = LocalBlobStore::new(&config.storage, &config.server).await?;
        // Accounts share the content database
        let auth = SessionService::new(store.clone(), config.auth.clone());

        Ok(Self::from_parts(config, store, Arc::new(auth), Arc::new(blobs)))
    }

    /// Wire the services over already-built infrastructure
    pub fn from_parts(
        config: Config,
        store: Arc<dyn EntityStore>,
        auth: Arc<SessionService>,
        blobs: Arc<LocalBlobStore>,
    ) -> Self {
        let sessions: Arc<dyn SessionResolver> =
            Arc::new(ProviderSessionResolver::new(auth.clone()));

        let post_service = PostService::new(
            store.clone(),
            sessions.clone(),
            blobs.clone(),
            config.content.clone(),
        );
        let comment_service = CommentService::new(store.clone(), sessions.clone());
        let account_service = AccountService::new(
            store.clone(),
            sessions.clone(),
            blobs.clone(),
            auth.clone(),
            config.content.clone(),
        );

        Self {
            config,
            store,
            auth,
            blobs,
            sessions,
            post_service,
            comment_service,
            account_service,
        }
    }
}
