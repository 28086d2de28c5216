//! CacheStore port - the external key-value service behind `ComputeCache`.
//!
//! Values are opaque strings. Availability and persistence are the backend's
//! business; `ComputeCache` treats every failure here as a degraded lookup or
//! a skipped write, never as a failed call.

use async_trait::async_trait;

use crate::domain::CacheKey;
use crate::error::StoreError;

/// Key-value capability consumed by `ComputeCache`.
///
/// # Thread Safety
/// - `Send + Sync` so one store can back several caches.
/// - Within one scheduler run it is only touched from the scheduling task.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn exists(&self, key: &CacheKey) -> Result<bool, StoreError>;

    /// `Ok(None)` when the key is absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &CacheKey, value: String) -> Result<(), StoreError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError>;
}
