//! In-process object store.
//!
//! Used for development runs and as the backing store in tests. Objects live
//! in a shared map, so clones of a `MemoryStorage` see the same contents.

use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Bytes>> {
        // Poisoning is ignored: every write is a single map operation.
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Bytes>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, _content_type: &str, data: Bytes) -> StorageResult<()> {
        validate_key(key)?;
        let size = data.len();
        self.write().insert(key.to_string(), data);
        tracing::debug!(key = %key, size_bytes = size, "Memory storage upload successful");
        Ok(())
    }

    async fn download(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        if self.write().remove(key).is_some() {
            tracing::debug!(key = %key, "Memory storage delete successful");
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.read().contains_key(key))
    }

    fn url(&self, key: &str) -> String {
        format!("memory://{}", key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
