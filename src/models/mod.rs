// Blog domain records and the request/response shapes built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{BlobHandle, CommentId, PostId, Timestamp, UserId};
use crate::error::{AppError, AppResult};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_POST_BODY_CHARS: usize = 50_000;
pub const MAX_COMMENT_BODY_CHARS: usize = 5_000;
pub const MAX_NAME_CHARS: usize = 100;

/// Identity issued by the auth provider. Posts and comments reference it by
/// id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

/// Stored user account: the principal plus its password hash. Never
/// serialized onto the wire.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct Account {
    pub id: UserId,
    pub name: String,
    /// Lower-cased; unique across accounts
    pub email: String,
    pub image: Option<String>,
    pub password_hash: String,
    pub creation_time: Timestamp,
}

impl Account {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<&Principal> for ProfileView {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            name: principal.name.clone(),
            email: principal.email.clone(),
            image: principal.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub author_id: UserId,
    pub image_storage_id: Option<BlobHandle>,
    pub creation_time: Timestamp,
}

/// Post with its image handle resolved to a fetchable URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub body: String,
    pub author_id: UserId,
    /// Snapshot of the author's name at creation time
    pub author_name: String,
    pub creation_time: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub image_storage_id: BlobHandle,
}

impl NewPost {
    /// Trimmed copy, or `Validation` when a field is out of bounds
    pub fn validated(self) -> AppResult<Self> {
        Ok(Self {
            title: bounded_text("title", &self.title, MAX_TITLE_CHARS)?,
            body: bounded_text("body", &self.body, MAX_POST_BODY_CHARS)?,
            image_storage_id: self.image_storage_id,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentBody {
    pub body: String,
}

pub fn validate_comment_body(body: &str) -> AppResult<String> {
    bounded_text("body", body, MAX_COMMENT_BODY_CHARS)
}

pub fn validate_display_name(name: &str) -> AppResult<String> {
    bounded_text("name", name, MAX_NAME_CHARS)
}

fn bounded_text(field: &str, value: &str, max_chars: usize) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub success: bool,
    pub posts_deleted: u64,
    pub comments_deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrl {
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub storage_id: BlobHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
