use catalog_core::{CatalogConfig, PostCommitCleanup};
use std::time::Duration;

/// Tuning for units of work run by the video service.
#[derive(Debug, Clone)]
pub struct UnitOfWorkConfig {
    /// Extra attempts after the first failed upload of a file.
    pub upload_max_retries: u32,
    /// Delay before retry `n` is `upload_retry_base_delay * n`.
    pub upload_retry_base_delay: Duration,
    /// How long to wait for another operation on the same video; `None` waits forever.
    pub entity_lock_timeout: Option<Duration>,
    pub post_commit_cleanup: PostCommitCleanup,
    /// Concurrent deletes while compensating or cleaning up.
    pub delete_concurrency: usize,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            upload_max_retries: 3,
            upload_retry_base_delay: Duration::from_millis(100),
            entity_lock_timeout: None,
            post_commit_cleanup: PostCommitCleanup::Inline,
            delete_concurrency: 8,
        }
    }
}

impl From<&CatalogConfig> for UnitOfWorkConfig {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            upload_max_retries: config.upload_max_retries,
            upload_retry_base_delay: Duration::from_millis(config.upload_retry_base_delay_ms),
            entity_lock_timeout: config.entity_lock_timeout_ms.map(Duration::from_millis),
            post_commit_cleanup: config.post_commit_cleanup,
            ..Self::default()
        }
    }
}
