//! InMemoryCacheStore - process-local CacheStore.
//!
//! Good for tests, demos and single-process batches where losing the cache on
//! exit is acceptable. Keys live in one `HashMap` behind a tokio `Mutex`;
//! no lock is held across an await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::CacheKey;
use crate::error::StoreError;
use crate::ports::CacheStore;

#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Raw stored text under `key`, bypassing decoding.
    pub async fn raw(&self, key: &CacheKey) -> Option<String> {
        self.entries.lock().await.get(key.as_str()).cloned()
    }

    /// Number of successful `set` calls since creation.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn exists(&self, key: &CacheKey) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.contains_key(key.as_str()))
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CacheKey, value: String) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key.as_str());
        Ok(())
    }
}
