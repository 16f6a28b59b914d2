//! Replacement of superseded attachments.
//!
//! Old object keys are captured while the unit of work is open and deleted only
//! from [`on_committed`], which needs the [`CommitToken`] that a successful
//! commit hands out. Deletion failures are logged and reported, never raised.

use catalog_core::models::{Video, VideoFileField};
use catalog_core::{AppError, PostCommitCleanup};
use catalog_storage::Storage;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::config::UnitOfWorkConfig;
use crate::unit_of_work::{CommitToken, UnitOfWork};

/// What post-commit cleanup did with the superseded objects.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// One `StorageDelete` per object that could not be removed.
    pub failed: Vec<AppError>,
    /// Keys handed to a background task; their outcome is only logged.
    pub deferred: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remember the key currently stored in `field` before it is overwritten.
pub fn capture_old(unit: &mut UnitOfWork, field: VideoFileField, prior_key: Option<&str>) {
    if let Some(key) = prior_key {
        tracing::debug!(unit_id = %unit.id(), field = %field, object_key = %key, "Captured old file");
        unit.record_old_key(field, key.to_string());
    }
}

/// Captured keys that the committed row no longer references in their field.
pub fn superseded_keys(token: &CommitToken, video: &Video) -> Vec<(VideoFileField, String)> {
    token
        .captured_old_keys()
        .iter()
        .filter(|(field, old)| video.file_key(**field) != Some(old.as_str()))
        .map(|(field, old)| (*field, old.clone()))
        .collect()
}

/// Delete every object superseded by the committed unit of work.
#[tracing::instrument(skip_all, fields(unit_id = %token.unit_id(), video_id = %video.id))]
pub async fn on_committed(
    token: CommitToken,
    video: &Video,
    storage: Arc<dyn Storage>,
    config: &UnitOfWorkConfig,
) -> CleanupReport {
    let superseded = superseded_keys(&token, video);
    if superseded.is_empty() {
        return CleanupReport::default();
    }

    match config.post_commit_cleanup {
        PostCommitCleanup::Inline => {
            delete_superseded(storage, superseded, config.delete_concurrency).await
        }
        PostCommitCleanup::Background => {
            let deferred: Vec<String> = superseded.iter().map(|(_, key)| key.clone()).collect();
            let concurrency = config.delete_concurrency;
            let unit_id = token.unit_id();
            tokio::spawn(async move {
                let report = delete_superseded(storage, superseded, concurrency).await;
                if !report.is_clean() {
                    tracing::warn!(
                        unit_id = %unit_id,
                        failed = report.failed.len(),
                        "Background cleanup left superseded files behind"
                    );
                }
            });
            CleanupReport {
                deferred,
                ..CleanupReport::default()
            }
        }
    }
}

async fn delete_superseded(
    storage: Arc<dyn Storage>,
    superseded: Vec<(VideoFileField, String)>,
    concurrency: usize,
) -> CleanupReport {
    let results: Vec<_> = stream::iter(superseded)
        .map(|(field, key)| {
            let storage = Arc::clone(&storage);
            async move {
                let result = storage.delete(&key).await;
                (field, key, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = CleanupReport::default();
    for (field, key, result) in results {
        match result {
            Ok(()) => {
                tracing::info!(field = %field, object_key = %key, "Deleted superseded file");
                report.deleted.push(key);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    field = %field,
                    object_key = %key,
                    "Failed to delete superseded file"
                );
                report.failed.push(AppError::StorageDelete {
                    key,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use catalog_core::models::{Rating, VideoAttributes};
    use catalog_db::MemoryCatalogStore;
    use catalog_storage::MemoryStorage;
    use chrono::Utc;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn video() -> Video {
        Video::new(
            Uuid::new_v4(),
            VideoAttributes {
                title: "Arrival".to_string(),
                description: "A linguist works with the military".to_string(),
                year_launched: 2016,
                opened: true,
                rating: Rating::Ten,
                duration: 116,
            },
            Utc::now(),
        )
    }

    async fn committed_token(captures: &[(VideoFileField, Option<&str>)]) -> CommitToken {
        let mut unit = UnitOfWork::begin(
            &MemoryCatalogStore::new(),
            Arc::new(MemoryStorage::new()),
            UnitOfWorkConfig::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        for (field, key) in captures {
            capture_old(&mut unit, *field, *key);
        }
        unit.commit().await.unwrap()
    }

    #[tokio::test]
    async fn test_deletes_only_superseded_keys() {
        let storage = MemoryStorage::new();
        for key in ["v/old.mp4", "v/thumb.jpg"] {
            storage
                .put(key, "application/octet-stream", Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let mut video = video();
        video.video_file = Some("v/new.mp4".to_string());
        video.thumb_file = Some("v/thumb.jpg".to_string());

        let token = committed_token(&[
            (VideoFileField::Video, Some("v/old.mp4")),
            (VideoFileField::Thumb, Some("v/thumb.jpg")),
            (VideoFileField::Banner, None),
        ])
        .await;

        let report = on_committed(
            token,
            &video,
            Arc::new(storage.clone()),
            &UnitOfWorkConfig::default(),
        )
        .await;

        assert_eq!(report.deleted, vec!["v/old.mp4".to_string()]);
        assert!(report.is_clean());
        assert_eq!(storage.keys(), vec!["v/thumb.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_background_cleanup_defers_keys() {
        let storage = MemoryStorage::new();
        storage
            .put("v/old.jpg", "image/jpeg", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let video = video();
        let token = committed_token(&[(VideoFileField::Banner, Some("v/old.jpg"))]).await;
        let config = UnitOfWorkConfig {
            post_commit_cleanup: PostCommitCleanup::Background,
            ..UnitOfWorkConfig::default()
        };

        let report = on_committed(token, &video, Arc::new(storage.clone()), &config).await;
        assert_eq!(report.deferred, vec!["v/old.jpg".to_string()]);
        assert!(report.deleted.is_empty());

        for _ in 0..50 {
            if storage.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(storage.is_empty());
    }
}
