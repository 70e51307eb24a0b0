use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub content: ContentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix used when minting upload and download URLs
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub blob_dir: PathBuf,
    pub upload_url_ttl_secs: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub session_ttl_secs: u64,
    pub password_min_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Delete a post's comments together with the post. Off by default:
    /// comments outlive their post and keep pointing at the vanished id.
    pub cascade_comments_on_post_delete: bool,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/inkpost.db".to_string()),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000)?,
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            storage: StorageConfig {
                blob_dir: env::var("BLOB_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data/blobs")),
                upload_url_ttl_secs: parse_var("UPLOAD_URL_TTL_SECS", 3600)?,
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            },
            auth: AuthConfig {
                session_ttl_secs: parse_var("SESSION_TTL_SECS", 7 * 24 * 3600)?,
                password_min_length: parse_var("PASSWORD_MIN_LENGTH", 8)?,
            },
            content: ContentConfig {
                cascade_comments_on_post_delete: parse_var(
                    "COMMENT_CASCADE_ON_POST_DELETE",
                    false,
                )?,
            },
        })
    }

    /// Configuration for tests and local experiments: in-memory database,
    /// blobs under the given directory.
    pub fn in_memory(blob_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_base_url: "http://localhost:3000".to_string(),
            },
            storage: StorageConfig {
                blob_dir: blob_dir.into(),
                upload_url_ttl_secs: 3600,
                max_upload_bytes: 10 * 1024 * 1024,
            },
            auth: AuthConfig {
                session_ttl_secs: 3600,
                password_min_length: 8,
            },
            content: ContentConfig {
                cascade_comments_on_post_delete: false,
            },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigurationError(format!("{} has an invalid value: {:?}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
