//! Per-video serialization of units of work.
//!
//! Each video id maps to an async mutex that is held for the whole unit of
//! work, including post-commit cleanup when it runs inline. Entries are kept
//! as weak references and pruned once nobody holds or waits on them.

use catalog_core::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<Uuid, Weak<AsyncMutex<()>>>>,
}

/// Held while a unit of work on one video is in progress.
pub struct EntityLockGuard {
    video_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl EntityLockGuard {
    pub fn video_id(&self) -> Uuid {
        self.video_id
    }
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, video_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| lock.strong_count() > 0);
        if let Some(lock) = locks.get(&video_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(video_id, Arc::downgrade(&lock));
        lock
    }

    /// Wait for exclusive access to `video_id`.
    ///
    /// Fails with `Conflict` once `timeout` elapses, or `Cancelled` if the
    /// token fires first.
    pub async fn acquire(
        &self,
        video_id: Uuid,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<EntityLockGuard, AppError> {
        let lock = self.entry(video_id);

        let acquire = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                    .await
                    .map_err(|_| {
                        tracing::warn!(
                            video_id = %video_id,
                            timeout_ms = limit.as_millis() as u64,
                            "Timed out waiting for video lock"
                        );
                        AppError::Conflict(format!(
                            "Video {} is being modified by another operation",
                            video_id
                        ))
                    }),
                None => Ok(lock.lock_owned().await),
            }
        };

        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            guard = acquire => guard?,
        };

        Ok(EntityLockGuard {
            video_id,
            _guard: guard,
        })
    }

    /// Number of ids with a live lock entry.
    pub fn tracked(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}
