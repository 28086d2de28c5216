//! ComputeCache: cache-aside wrapper around remote calls.
//!
//! Flow for one call:
//! 1. Derive the key from the call identity.
//! 2. Serve the stored value if it decodes. Blank, `null` or undecodable
//!    entries are evicted and treated as a miss.
//! 3. On a miss, wait the pacing delay, then run the compute with bounded
//!    retry. Transient failures back off and retry; a fatal failure is
//!    returned at once; exhausting the attempts yields no value.
//! 4. Persist present values. An absent value is never stored, and a failed
//!    write evicts the key but still hands the value back.

pub mod codec;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::CacheConfig;
use crate::domain::{CacheIdentity, CacheKey, ResultEnvelope};
use crate::error::{CacheError, ComputeError, StoreError};
use crate::observability::{CacheCounters, CacheStats};
use crate::ports::CacheStore;

pub use self::retry::RetryPolicy;

pub struct ComputeCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    retry: RetryPolicy,
    counters: CacheCounters,
}

impl ComputeCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            store,
            config,
            retry,
            counters: CacheCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn key_for(&self, identity: &CacheIdentity) -> CacheKey {
        identity.key(&self.config.key_prefix)
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Cached value for `identity`, or the result of `compute`.
    ///
    /// `compute` may run up to `max_attempts` times. `Ok(None)` means the
    /// compute produced nothing or every attempt failed transiently.
    ///
    /// # Errors
    /// `CacheError::FatalCompute` when `compute` reports a fatal failure.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        identity: &CacheIdentity,
        compute: F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ComputeError>>,
    {
        Ok(self.fetch(identity, compute).await?.into_value())
    }

    /// Like `get_or_compute` with a per-call pacing delay.
    pub async fn get_or_compute_with_delay<T, F, Fut>(
        &self,
        identity: &CacheIdentity,
        delay: Duration,
        compute: F,
    ) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ComputeError>>,
    {
        Ok(self
            .fetch_with_delay(identity, delay, compute)
            .await?
            .into_value())
    }

    /// Like `get_or_compute`, but keeps the cache status for pacing.
    pub async fn fetch<T, F, Fut>(
        &self,
        identity: &CacheIdentity,
        compute: F,
    ) -> Result<ResultEnvelope<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ComputeError>>,
    {
        self.fetch_with_delay(identity, self.config.compute_delay(), compute)
            .await
    }

    pub async fn fetch_with_delay<T, F, Fut>(
        &self,
        identity: &CacheIdentity,
        delay: Duration,
        compute: F,
    ) -> Result<ResultEnvelope<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ComputeError>>,
    {
        let key = self.key_for(identity);

        if let Some(value) = self.lookup::<T>(&key).await {
            CacheCounters::bump(&self.counters.hits);
            debug!(key = %key, "cache hit");
            return Ok(ResultEnvelope::hit(value, &key));
        }
        CacheCounters::bump(&self.counters.misses);
        debug!(key = %key, "cache miss");

        let Some(value) = self.compute_with_retry(&key, delay, compute).await? else {
            debug!(key = %key, "no value computed, nothing cached");
            return Ok(ResultEnvelope::live(None, None));
        };

        let stored = self.persist(&key, &value).await;
        Ok(ResultEnvelope::live(Some(value), stored.then_some(&key)))
    }

    /// Drop the entry for `identity`, if any.
    pub async fn invalidate(&self, identity: &CacheIdentity) -> Result<(), StoreError> {
        let key = self.key_for(identity);
        debug!(key = %key, "invalidating cache entry");
        self.store.delete(&key).await
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.store.exists(key).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                warn!(key = %key, error = %err, "cache lookup failed, computing instead");
                return None;
            }
        }

        let raw = match self.store.get(key).await {
            Ok(raw) => raw.unwrap_or_default(),
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, computing instead");
                return None;
            }
        };

        match codec::decode::<T>(&raw) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                warn!(key = %key, "empty cache entry, evicting");
                CacheCounters::bump(&self.counters.evictions);
                self.evict(key).await;
                None
            }
            Err(err) => {
                warn!(key = %key, error = %err, "corrupt cache entry, evicting");
                CacheCounters::bump(&self.counters.evictions);
                self.evict(key).await;
                None
            }
        }
    }

    async fn compute_with_retry<T, F, Fut>(
        &self,
        key: &CacheKey,
        delay: Duration,
        mut compute: F,
    ) -> Result<Option<T>, CacheError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ComputeError>>,
    {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            CacheCounters::bump(&self.counters.compute_attempts);

            match compute().await {
                Ok(value) => return Ok(value),
                Err(ComputeError::Fatal(reason)) => {
                    CacheCounters::bump(&self.counters.fatal_failures);
                    error!(key = %key, attempt = attempts, reason = %reason, "fatal compute failure");
                    return Err(CacheError::FatalCompute {
                        key: key.to_string(),
                        reason,
                    });
                }
                Err(ComputeError::Transient(reason)) => {
                    CacheCounters::bump(&self.counters.transient_failures);
                    if !self.retry.should_retry(attempts) {
                        warn!(
                            key = %key,
                            attempts,
                            reason = %reason,
                            "compute attempts exhausted, returning no value"
                        );
                        return Ok(None);
                    }
                    let backoff = self.retry.next_delay(attempts);
                    warn!(
                        key = %key,
                        attempt = attempts,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        reason = %reason,
                        "transient compute failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    // Returns whether the value is now in the store. A value that encodes to
    // `null` counts as absent and is never written.
    async fn persist<T: Serialize>(&self, key: &CacheKey, value: &T) -> bool {
        let written = match codec::encode(value) {
            Ok(raw) if raw == "null" => {
                debug!(key = %key, "computed value is null, nothing cached");
                return false;
            }
            Ok(raw) => self.store.set(key, raw).await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match written {
            Ok(()) => true,
            Err(reason) => {
                CacheCounters::bump(&self.counters.write_failures);
                warn!(key = %key, reason = %reason, "cache write failed, evicting key");
                self.evict(key).await;
                false
            }
        }
    }

    async fn evict(&self, key: &CacheKey) {
        if let Err(err) = self.store.delete(key).await {
            warn!(key = %key, error = %err, "cache delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde::Deserialize;
    use tokio::time::Instant;

    use super::*;
    use crate::domain::Action;
    use crate::impls::InMemoryCacheStore;

    fn setup() -> (Arc<InMemoryCacheStore>, ComputeCache) {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = ComputeCache::new(store.clone(), CacheConfig::default());
        (store, cache)
    }

    fn block(n: u64) -> CacheIdentity {
        CacheIdentity::new("chain1", "getBlock").arg(n.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_is_served_from_cache() {
        let (_store, cache) = setup();
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(1_700_000_000u64)) }
        };

        let first: Option<u64> = cache.get_or_compute(&block(100), compute).await.unwrap();
        let second: Option<u64> = cache.get_or_compute(&block(100), compute).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_envelope_drives_the_hint() {
        let (_store, cache) = setup();
        let compute = || async { Ok(Some("0xabc".to_string())) };

        let miss = cache.fetch(&block(7), compute).await.unwrap();
        assert!(!miss.is_cache_hit());
        assert_eq!(miss.hint(), Action::WaitAndContinue);
        assert_eq!(miss.cache_key(), cache.key_for(&block(7)).as_str());

        let hit = cache.fetch(&block(7), compute).await.unwrap();
        assert!(hit.is_cache_hit());
        assert_eq!(hit.hint(), Action::SkipDelay);
        assert_eq!(hit.into_value().as_deref(), Some("0xabc"));
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_entry_is_recomputed_and_overwritten() {
        let (store, cache) = setup();
        let key = cache.key_for(&block(5));
        store.set(&key, "{not json".to_string()).await.unwrap();

        let calls = AtomicU32::new(0);
        let value: Option<u64> = cache
            .get_or_compute(&block(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Some(5u64)) }
            })
            .await
            .unwrap();

        assert_eq!(value, Some(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.raw(&key).await.as_deref(), Some("5"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn null_entry_is_evicted_and_recomputed() {
        let (store, cache) = setup();
        let key = cache.key_for(&block(6));
        store.set(&key, "null".to_string()).await.unwrap();

        let value: Option<u64> = cache
            .get_or_compute(&block(6), || async { Ok(Some(6u64)) })
            .await
            .unwrap();

        assert_eq!(value, Some(6));
        assert_eq!(store.raw(&key).await.as_deref(), Some("6"));
    }

    #[tokio::test(start_paused = true)]
    async fn absent_value_is_never_cached() {
        let (store, cache) = setup();
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None::<u64>) }
        };

        assert_eq!(cache.get_or_compute(&block(8), compute).await.unwrap(), None);
        assert_eq!(cache.get_or_compute(&block(8), compute).await.unwrap(), None);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.writes(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn null_valued_result_is_never_cached() {
        let (store, cache) = setup();
        let id = CacheIdentity::new("chain1", "getTransactionReceipt").arg("0xpending");
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(serde_json::Value::Null)) }
        };

        let first = cache.fetch(&id, compute).await.unwrap();
        let second = cache.fetch(&id, compute).await.unwrap();

        assert_eq!(first.value(), Some(&serde_json::Value::Null));
        assert_eq!(first.cache_key(), "");
        assert!(!second.is_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.writes(), 0);
        assert!(store.is_empty().await);
        let stats = cache.stats();
        assert_eq!((stats.evictions, stats.write_failures), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_exhaust_retries_then_return_none() {
        let (store, cache) = setup();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let value: Option<u64> = cache
            .get_or_compute(&block(9), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ComputeError::transient("connection reset by peer")) }
            })
            .await
            .unwrap();

        assert_eq!(value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(store.writes(), 0);
        // pacing delay + backoff after attempts 1..=4
        assert!(started.elapsed() >= Duration::from_millis(75 + 75 + 825 + 1575 + 2325));
        assert_eq!(cache.stats().transient_failures, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_short_circuits() {
        let (store, cache) = setup();
        let calls = AtomicU32::new(0);

        let result: Result<Option<u64>, _> = cache
            .get_or_compute(&block(10), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ComputeError::fatal("execution reverted")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let Err(CacheError::FatalCompute { key, reason }) = result else {
            panic!("expected a fatal compute failure");
        };
        assert_eq!(key, cache.key_for(&block(10)).to_string());
        assert!(reason.contains("execution reverted"));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success_is_cached() {
        let (store, cache) = setup();
        let calls = AtomicU32::new(0);

        let value: Option<u64> = cache
            .get_or_compute(&block(11), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ComputeError::from(std::io::Error::other("timeout")))
                    } else {
                        Ok(Some(11u64))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, Some(11));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_delay_overrides_config() {
        let (_store, cache) = setup();
        let started = Instant::now();
        let _: Option<u64> = cache
            .get_or_compute_with_delay(&block(12), Duration::from_secs(3), || async {
                Ok(Some(1u64))
            })
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_recompute() {
        let (_store, cache) = setup();
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(3u64)) }
        };

        let _: Option<u64> = cache.get_or_compute(&block(13), compute).await.unwrap();
        cache.invalidate(&block(13)).await.unwrap();
        let _: Option<u64> = cache.get_or_compute(&block(13), compute).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn older_entries_decode_into_newer_schema_subset() {
        #[derive(Serialize, Deserialize)]
        struct Full {
            hash: String,
            gas_used: u64,
        }
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Slim {
            hash: String,
        }

        let (_store, cache) = setup();
        let id = CacheIdentity::new("chain1", "getTxByHash").arg("0xfeed");
        let _: Option<Full> = cache
            .get_or_compute(&id, || async {
                Ok(Some(Full {
                    hash: "0xfeed".to_string(),
                    gas_used: 21_000,
                }))
            })
            .await
            .unwrap();

        let slim = cache
            .fetch(&id, || async { Err::<Option<Slim>, _>(ComputeError::fatal("must not run")) })
            .await
            .unwrap();
        assert!(slim.is_cache_hit());
        assert_eq!(
            slim.into_value(),
            Some(Slim {
                hash: "0xfeed".to_string()
            })
        );
    }

    /// Store that rejects writes or fails lookups on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryCacheStore,
        reject_writes: bool,
        fail_lookups: bool,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheStore for FlakyStore {
        async fn exists(&self, key: &CacheKey) -> Result<bool, StoreError> {
            if self.fail_lookups {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.exists(key).await
        }

        async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &CacheKey, value: String) -> Result<(), StoreError> {
            if self.reject_writes {
                return Err(StoreError::Rejected {
                    key: key.to_string(),
                    reason: "OOM command not allowed".to_string(),
                });
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
            self.deleted.lock().unwrap().push(key.to_string());
            self.inner.delete(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_still_returns_value_and_evicts() {
        let store = Arc::new(FlakyStore {
            reject_writes: true,
            ..FlakyStore::default()
        });
        let cache = ComputeCache::new(store.clone(), CacheConfig::default());

        let envelope = cache
            .fetch(&block(14), || async { Ok(Some(14u64)) })
            .await
            .unwrap();

        assert_eq!(envelope.value(), Some(&14));
        assert_eq!(envelope.cache_key(), "");
        assert_eq!(
            store.deleted.lock().unwrap().as_slice(),
            &[cache.key_for(&block(14)).to_string()]
        );
        assert_eq!(cache.stats().write_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_store_degrades_to_compute() {
        let store = Arc::new(FlakyStore {
            fail_lookups: true,
            ..FlakyStore::default()
        });
        let cache = ComputeCache::new(store, CacheConfig::default());

        let value: Option<u64> = cache
            .get_or_compute(&block(15), || async { Ok(Some(15u64)) })
            .await
            .unwrap();
        assert_eq!(value, Some(15));
        assert_eq!(cache.stats().misses, 1);
    }
}
