/// Object storage for uploaded post images
///
/// Uploads return a durable fetch URL that is written into the post document.
pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStorage;
pub use s3::S3ObjectStorage;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload failed for {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Download failed for {key}: {message}")]
    Download { key: String, message: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Bytes plus the content type they were uploaded with.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` and return the URL clients fetch it from.
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<String>;

    async fn download(&self, key: &str) -> StorageResult<Option<StoredObject>>;

    async fn ping(&self) -> StorageResult<()>;
}

/// Join a base URL and an object key with exactly one slash.
pub fn public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
