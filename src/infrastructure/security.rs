// Authentication provider - account storage, sign-up/in/out and sessions
// The blog services only consume `get_session`; everything else backs the
// account screens.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::config::AuthConfig;
use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::framework::Entity;
use crate::infrastructure::database::EntityStore;
use crate::models::{validate_display_name, Account, Principal, Session};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

const SESSION_TOKEN_BYTES: usize = 32;

/// External identity service as seen by this crate
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> AppResult<Session>;
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session>;
    /// Idempotent
    async fn sign_out(&self, token: &str) -> AppResult<()>;
    /// `None` for unknown or expired tokens
    async fn get_session(&self, token: &str) -> AppResult<Option<Principal>>;
    async fn update_name(&self, user_id: UserId, name: &str) -> AppResult<Principal>;
    async fn change_password(&self, user_id: UserId, current: &str, new: &str) -> AppResult<()>;
    /// Removes the user's credentials and ends all of its sessions
    async fn delete_user(&self, user_id: UserId) -> AppResult<()>;
}

#[derive(Debug, Clone)]
struct SessionRecord {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Auth provider over the entity store. Accounts live in the `accounts`
/// collection next to the content that references them; passwords are
/// hashed with Argon2. Sessions are opaque random tokens with a fixed
/// lifetime, held in process, so a restart signs everyone out.
pub struct SessionService {
    store: Arc<dyn EntityStore>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    /// Serializes the email uniqueness check with the insert
    sign_up_lock: Mutex<()>,
    config: AuthConfig,
}

impl SessionService {
    pub fn new(store: Arc<dyn EntityStore>, config: AuthConfig) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            sign_up_lock: Mutex::new(()),
            config,
        }
    }

    async fn issue_session(&self, principal: Principal) -> Session {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let expires_at = Utc::now() + Duration::seconds(self.config.session_ttl_secs as i64);

        self.sessions.write().await.insert(
            token.clone(),
            SessionRecord {
                user_id: principal.id,
                expires_at,
            },
        );

        Session {
            token,
            principal,
            expires_at,
        }
    }

    fn check_password_strength(&self, password: &str) -> AppResult<()> {
        if password.chars().count() < self.config.password_min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.config.password_min_length
            )));
        }
        Ok(())
    }

    async fn email_taken(&self, email: &str) -> AppResult<bool> {
        Ok(Account::gen_by_email(self.store.as_ref(), email).await?.is_some())
    }

    /// Drop every expired session; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        before - sessions.len()
    }
}

fn email_conflict() -> AppError {
    AppError::Conflict("An account with this email already exists".to_string())
}

#[async_trait]
impl AuthProvider for SessionService {
    #[instrument(skip(self, password))]
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> AppResult<Session> {
        let name = validate_display_name(name)?;
        let email = normalize_email(email)?;
        self.check_password_strength(password)?;

        if self.email_taken(&email).await? {
            return Err(email_conflict());
        }
        let password_hash = hash_password(password.to_string()).await?;

        let account = {
            let _guard = self.sign_up_lock.lock().await;
            // Re-check under the lock: hashing ran unlocked
            if self.email_taken(&email).await? {
                return Err(email_conflict());
            }
            Account::create(self.store.as_ref(), name, email, password_hash).await?
        };

        info!(user_id = %account.id, "user signed up");
        Ok(self.issue_session(account.principal()).await)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let invalid = || AppError::Unauthenticated("Invalid email or password".to_string());
        let email = email.trim().to_lowercase();

        let account = Account::gen_by_email(self.store.as_ref(), &email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password.to_string(), account.password_hash.clone()).await? {
            warn!(user_id = %account.id, "sign-in rejected");
            return Err(invalid());
        }

        info!(user_id = %account.id, "user signed in");
        Ok(self.issue_session(account.principal()).await)
    }

    async fn sign_out(&self, token: &str) -> AppResult<()> {
        if let Some(record) = self.sessions.write().await.remove(token) {
            info!(user_id = %record.user_id, "user signed out");
        }
        Ok(())
    }

    async fn get_session(&self, token: &str) -> AppResult<Option<Principal>> {
        let record = self.sessions.read().await.get(token).cloned();
        let Some(record) = record else {
            return Ok(None);
        };

        if record.expires_at <= Utc::now() {
            self.sessions.write().await.remove(token);
            return Ok(None);
        }

        Ok(Account::gen_nullable(self.store.as_ref(), record.user_id)
            .await?
            .map(|account| account.principal()))
    }

    #[instrument(skip(self))]
    async fn update_name(&self, user_id: UserId, name: &str) -> AppResult<Principal> {
        let name = validate_display_name(name)?;
        if !Account::set_name(self.store.as_ref(), user_id, name).await? {
            return Err(user_not_found(user_id));
        }
        Ok(Account::gen_enforce(self.store.as_ref(), user_id).await?.principal())
    }

    #[instrument(skip(self, current, new))]
    async fn change_password(&self, user_id: UserId, current: &str, new: &str) -> AppResult<()> {
        self.check_password_strength(new)?;

        let account = Account::gen_enforce(self.store.as_ref(), user_id).await?;
        if !verify_password(current.to_string(), account.password_hash).await? {
            return Err(AppError::Forbidden("Current password is incorrect".to_string()));
        }

        let new_hash = hash_password(new.to_string()).await?;
        if !Account::set_password_hash(self.store.as_ref(), user_id, new_hash).await? {
            return Err(user_not_found(user_id));
        }
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        if !Account::delete(self.store.as_ref(), user_id).await? {
            return Err(user_not_found(user_id));
        }

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, record| record.user_id != user_id);
        info!(user_id = %user_id, "user deleted");
        Ok(())
    }
}

fn user_not_found(user_id: UserId) -> AppError {
    AppError::NotFound(format!("User {} not found", user_id))
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(AppError::Validation("Email address is not valid".to_string()));
    }
    Ok(email)
}

/// Argon2 is deliberately slow, so it runs off the async workers
async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || -> AppResult<bool> {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
}
