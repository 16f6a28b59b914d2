#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{MemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use catalog_core::CatalogConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &CatalogConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config
                .s3_region
                .clone()
                .or_else(|| config.aws_region.clone())
                .ok_or_else(|| {
                    StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
                })?;

            let storage = S3Storage::new(bucket, region, config.s3_endpoint.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; files are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use catalog_core::PostCommitCleanup;

    fn config(backend: StorageBackend, path: Option<String>) -> CatalogConfig {
        CatalogConfig {
            environment: "test".to_string(),
            database_url: "postgres://localhost/catalog".to_string(),
            db_max_connections: 1,
            db_timeout_seconds: 1,
            storage_backend: backend,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: path,
            local_storage_base_url: Some("http://localhost:4000/files".to_string()),
            upload_max_retries: 0,
            upload_retry_base_delay_ms: 0,
            entity_lock_timeout_ms: None,
            post_commit_cleanup: PostCommitCleanup::Inline,
        }
    }

    #[tokio::test]
    async fn test_create_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let storage = create_storage(&config(StorageBackend::Local, Some(path)))
            .await
            .unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_local_storage_requires_path() {
        let result = create_storage(&config(StorageBackend::Local, None)).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_create_memory_storage() {
        let storage = create_storage(&config(StorageBackend::Memory, None))
            .await
            .unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }
}
