// Blob Store - one-time upload targets and stable download URLs for images

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ServerConfig, StorageConfig};
use crate::core::BlobHandle;
use crate::error::{AppError, AppResult};
use crate::models::UploadUrl;

const CONTENT_TYPE_SUFFIX: &str = ".type";

/// A stored blob as read back for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Mint a one-time upload target
    async fn generate_upload_url(&self) -> AppResult<UploadUrl>;

    /// Consume an upload token; `NotFound` when the token is unknown,
    /// expired or already used
    async fn store(&self, token: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<BlobHandle>;

    /// Download URL, or `None` when nothing is stored under the handle
    async fn get_url(&self, handle: &BlobHandle) -> AppResult<Option<String>>;

    async fn read(&self, handle: &BlobHandle) -> AppResult<Option<BlobContent>>;

    /// False when nothing was stored under the handle
    async fn delete(&self, handle: &BlobHandle) -> AppResult<bool>;
}

/// Blobs as files under a directory, with the content type in a sidecar file
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    upload_ttl: Duration,
    pending_uploads: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl LocalBlobStore {
    pub async fn new(storage: &StorageConfig, server: &ServerConfig) -> AppResult<Self> {
        tokio::fs::create_dir_all(&storage.blob_dir).await?;
        Ok(Self {
            root: storage.blob_dir.clone(),
            public_base_url: server.public_base_url.trim_end_matches('/').to_string(),
            upload_ttl: Duration::seconds(storage.upload_url_ttl_secs as i64),
            pending_uploads: Mutex::new(HashMap::new()),
        })
    }

    fn blob_path(&self, handle: &BlobHandle) -> PathBuf {
        self.root.join(handle.as_str())
    }

    fn content_type_path(&self, handle: &BlobHandle) -> PathBuf {
        self.root.join(format!("{}{}", handle.as_str(), CONTENT_TYPE_SUFFIX))
    }

    /// Forget upload tokens that were never used
    pub async fn cleanup_expired_uploads(&self) -> usize {
        let now = Utc::now();
        let mut pending = self.pending_uploads.lock().await;
        let before = pending.len();
        pending.retain(|_, expires_at| *expires_at > now);
        before - pending.len()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn generate_upload_url(&self) -> AppResult<UploadUrl> {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + self.upload_ttl;
        self.pending_uploads
            .lock()
            .await
            .insert(token.clone(), expires_at);

        Ok(UploadUrl {
            upload_url: format!("{}/api/v1/storage/upload/{}", self.public_base_url, token),
            expires_at,
        })
    }

    async fn store(&self, token: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<BlobHandle> {
        let expires_at = self.pending_uploads.lock().await.remove(token);
        match expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => {
                return Err(AppError::NotFound(
                    "Upload URL is unknown, expired or already used".to_string(),
                ))
            }
        }

        if bytes.is_empty() {
            return Err(AppError::Validation("Upload body is empty".to_string()));
        }
        let content_type = content_type.trim();
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "Only images can be uploaded, got {:?}",
                content_type
            )));
        }

        let handle =
            BlobHandle::new(&Uuid::new_v4().simple().to_string()).map_err(AppError::Internal)?;
        tokio::fs::write(self.blob_path(&handle), &bytes).await?;
        tokio::fs::write(self.content_type_path(&handle), content_type).await?;

        info!(handle = %handle, size = bytes.len(), "blob stored");
        Ok(handle)
    }

    async fn get_url(&self, handle: &BlobHandle) -> AppResult<Option<String>> {
        if !tokio::fs::try_exists(self.blob_path(handle)).await? {
            debug!(handle = %handle, "no blob behind handle");
            return Ok(None);
        }
        Ok(Some(format!(
            "{}/api/v1/storage/files/{}",
            self.public_base_url, handle
        )))
    }

    async fn read(&self, handle: &BlobHandle) -> AppResult<Option<BlobContent>> {
        let bytes = match tokio::fs::read(self.blob_path(handle)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match tokio::fs::read_to_string(self.content_type_path(handle)).await {
            Ok(content_type) => content_type,
            Err(e) if e.kind() == IoErrorKind::NotFound => "application/octet-stream".to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(BlobContent {
            bytes,
            content_type,
        }))
    }

    async fn delete(&self, handle: &BlobHandle) -> AppResult<bool> {
        match tokio::fs::remove_file(self.blob_path(handle)).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        match tokio::fs::remove_file(self.content_type_path(handle)).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir) -> LocalBlobStore {
        let config = Config::in_memory(dir.path());
        LocalBlobStore::new(&config.storage, &config.server).await.unwrap()
    }

    fn token_of(url: &UploadUrl) -> &str {
        url.upload_url.rsplit('/').next().unwrap()
    }

    #[tokio::test]
    async fn test_upload_is_one_time() {
        let dir = TempDir::new().unwrap();
        let blobs = store_in(&dir).await;
        let url = blobs.generate_upload_url().await.unwrap();
        assert!(url
            .upload_url
            .starts_with("http://localhost:3000/api/v1/storage/upload/"));

        let handle = blobs
            .store(token_of(&url), vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        let again = blobs.store(token_of(&url), vec![1], "image/png").await;
        assert!(matches!(again, Err(AppError::NotFound(_))));

        let content = blobs.read(&handle).await.unwrap().unwrap();
        assert_eq!(content.bytes, vec![1, 2, 3]);
        assert_eq!(content.content_type, "image/png");
        assert_eq!(
            blobs.get_url(&handle).await.unwrap().unwrap(),
            format!("http://localhost:3000/api/v1/storage/files/{}", handle)
        );
    }

    #[tokio::test]
    async fn test_unknown_and_expired_tokens() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::in_memory(dir.path());
        config.storage.upload_url_ttl_secs = 0;
        let blobs = LocalBlobStore::new(&config.storage, &config.server).await.unwrap();

        let unknown = blobs.store("nope", vec![1], "image/png").await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let url = blobs.generate_upload_url().await.unwrap();
        let expired = blobs.store(token_of(&url), vec![1], "image/png").await;
        assert!(matches!(expired, Err(AppError::NotFound(_))));
        assert_eq!(blobs.cleanup_expired_uploads().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_non_images_and_empty_bodies() {
        let dir = TempDir::new().unwrap();
        let blobs = store_in(&dir).await;

        let url = blobs.generate_upload_url().await.unwrap();
        let err = blobs.store(token_of(&url), vec![1], "text/plain").await;
        assert!(matches!(err, Err(AppError::Validation(_))));

        let url = blobs.generate_upload_url().await.unwrap();
        let err = blobs.store(token_of(&url), Vec::new(), "image/png").await;
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_handle_and_delete() {
        let dir = TempDir::new().unwrap();
        let blobs = store_in(&dir).await;
        let missing = BlobHandle::new("does-not-exist").unwrap();
        assert_eq!(blobs.get_url(&missing).await.unwrap(), None);
        assert_eq!(blobs.read(&missing).await.unwrap(), None);
        assert!(!blobs.delete(&missing).await.unwrap());

        let url = blobs.generate_upload_url().await.unwrap();
        let handle = blobs.store(token_of(&url), vec![9], "image/jpeg").await.unwrap();
        assert!(blobs.delete(&handle).await.unwrap());
        assert_eq!(blobs.get_url(&handle).await.unwrap(), None);
    }
}
