// Session Resolver - the single place where a request's credentials turn
// into an authenticated principal

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::infrastructure::security::AuthProvider;
use crate::infrastructure::viewer::viewer::ViewerContext;
use crate::models::Principal;

/// Resolves the principal behind a request. Never fails: a missing,
/// unknown or expired session, or a provider error, all yield `None`.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, vc: &ViewerContext) -> Option<Principal>;
}

/// Resolver backed by the auth provider's session lookup
pub struct ProviderSessionResolver {
    provider: Arc<dyn AuthProvider>,
}

impl ProviderSessionResolver {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SessionResolver for ProviderSessionResolver {
    async fn resolve(&self, vc: &ViewerContext) -> Option<Principal> {
        let token = vc.session_token.as_deref()?;
        match self.provider.get_session(token).await {
            Ok(Some(principal)) => Some(principal),
            Ok(None) => {
                debug!(request_id = %vc.request_id, "session token did not resolve");
                None
            }
            Err(e) => {
                warn!(request_id = %vc.request_id, "session lookup failed: {}", e);
                None
            }
        }
    }
}
