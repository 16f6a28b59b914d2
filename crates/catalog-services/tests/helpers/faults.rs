//! Fault-injecting wrappers around the in-memory stores.

use async_trait::async_trait;
use bytes::Bytes;
use catalog_core::models::{TagKind, Video};
use catalog_core::AppError;
use catalog_db::{CatalogStore, CatalogTransaction, MemoryCatalogStore};
use catalog_storage::{MemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Object store that can fail or stall puts and fail deletes on demand.
#[derive(Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    puts: AtomicUsize,
    fail_puts_from: Mutex<Option<usize>>,
    transient_failures: AtomicU32,
    slow_puts_from: Mutex<Option<(usize, Duration)>>,
    detached_puts: AtomicBool,
    fail_deletes: AtomicBool,
    written: Mutex<Vec<String>>,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put with index >= `n` (0-based) fails permanently.
    pub fn fail_puts_from(&self, n: usize) {
        *self.fail_puts_from.lock().unwrap() = Some(n);
    }

    /// The next `n` puts fail with a retryable error.
    pub fn fail_next_puts_transiently(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Every put with index >= `n` waits `delay` before writing.
    pub fn slow_puts_from(&self, n: usize, delay: Duration) {
        *self.slow_puts_from.lock().unwrap() = Some((n, delay));
    }

    /// Slow puts finish on a spawned task, so dropping the caller's future
    /// does not stop the write.
    pub fn detach_slow_puts(&self, detached: bool) {
        self.detached_puts.store(detached, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Keys of every successful put, including ones deleted since.
    pub fn written_keys(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.keys().iter().any(|k| k == key)
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> StorageResult<()> {
        let index = self.puts.fetch_add(1, Ordering::SeqCst);

        if let Some(from) = *self.fail_puts_from.lock().unwrap() {
            if index >= from {
                return Err(StorageError::ConfigError("bucket policy denies write".to_string()));
            }
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::UploadFailed("503 Slow Down".to_string()));
        }
        let slow = *self.slow_puts_from.lock().unwrap();
        match slow {
            Some((from, delay)) if index >= from && self.detached_puts.load(Ordering::SeqCst) => {
                let inner = self.inner.clone();
                let (key, content_type) = (key.to_string(), content_type.to_string());
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.put(&key, &content_type, data).await
                })
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))??;
            }
            Some((from, delay)) if index >= from => {
                tokio::time::sleep(delay).await;
                self.inner.put(key, content_type, data).await?;
            }
            _ => self.inner.put(key, content_type, data).await?,
        }
        self.written.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn download(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.download(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!("{}: connection reset", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn url(&self, key: &str) -> String {
        self.inner.url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[derive(Default)]
struct Faults {
    fail_commit: AtomicBool,
    fail_link_insert: Mutex<Option<TagKind>>,
}

/// Relational store whose transactions can fail on commit or on link inserts.
#[derive(Clone, Default)]
pub struct FaultyCatalogStore {
    pub inner: MemoryCatalogStore,
    faults: Arc<Faults>,
}

impl FaultyCatalogStore {
    pub fn new(inner: MemoryCatalogStore) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    pub fn fail_commit(&self, fail: bool) {
        self.faults.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_link_insert(&self, kind: Option<TagKind>) {
        *self.faults.fail_link_insert.lock().unwrap() = kind;
    }
}

#[async_trait]
impl CatalogStore for FaultyCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            faults: Arc::clone(&self.faults),
        }))
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        self.inner.get_video(id).await
    }

    async fn linked_ids(&self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        self.inner.linked_ids(kind, video_id).await
    }

    async fn categories_covered_by_genre(
        &self,
        genre_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        self.inner
            .categories_covered_by_genre(genre_id, category_ids)
            .await
    }

    async fn existing_ids(&self, kind: TagKind, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        self.inner.existing_ids(kind, ids).await
    }
}

struct FaultyTransaction {
    inner: Box<dyn CatalogTransaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl CatalogTransaction for FaultyTransaction {
    async fn insert_video(&mut self, video: &Video) -> Result<(), AppError> {
        self.inner.insert_video(video).await
    }

    async fn update_video(&mut self, video: &Video) -> Result<(), AppError> {
        self.inner.update_video(video).await
    }

    async fn lock_video(&mut self, id: Uuid) -> Result<Option<Video>, AppError> {
        self.inner.lock_video(id).await
    }

    async fn linked_ids(&mut self, kind: TagKind, video_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        self.inner.linked_ids(kind, video_id).await
    }

    async fn insert_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        if *self.faults.fail_link_insert.lock().unwrap() == Some(kind) {
            return Err(AppError::transaction_abort(
                format!("insert into {} failed", kind.link_table()),
                anyhow::anyhow!("deadlock detected"),
            ));
        }
        self.inner.insert_links(kind, video_id, ids).await
    }

    async fn delete_links(
        &mut self,
        kind: TagKind,
        video_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, AppError> {
        self.inner.delete_links(kind, video_id, ids).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            self.inner.rollback().await?;
            return Err(AppError::transaction_abort(
                "Failed to commit database transaction",
                anyhow::anyhow!("could not serialize access due to concurrent update"),
            ));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.inner.rollback().await
    }
}
