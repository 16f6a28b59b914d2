//! Object store abstraction trait
//!
//! This module defines the Storage trait that all object store backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether repeating the same call may succeed.
    ///
    /// Bad keys, missing objects and configuration problems fail the same
    /// way every time; everything else is treated as a passing backend fault.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            StorageError::InvalidKey(_) | StorageError::NotFound(_) | StorageError::ConfigError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object store abstraction
///
/// Keys are opaque to the store; the catalog lays them out as
/// `{video_id}/{file_uuid}.{ext}` (see [`crate::object_key`]). Writes are not
/// part of any relational transaction, so callers that need atomicity track
/// what they wrote and delete it themselves on failure.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()>;

    /// Read an object by its key
    async fn download(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete an object by its key
    ///
    /// Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Publicly reachable URL for a key
    fn url(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
