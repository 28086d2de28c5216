//! CachedFetcher - cache-aside GET/POST over a `Transport`.
//!
//! Response text is cached under namespace `http`, method `GET` or `POST`.
//! The URL (and body, for POST) form the key arguments, so the usual key
//! normalization applies: two requests that differ only in letter case or
//! whitespace share an entry.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ComputeCache;
use crate::domain::{CacheIdentity, ResultEnvelope};
use crate::error::CacheError;
use crate::ports::Transport;

pub const HTTP_NAMESPACE: &str = "http";

pub struct CachedFetcher<T> {
    cache: Arc<ComputeCache>,
    transport: T,
}

impl<T: Transport> CachedFetcher<T> {
    pub fn new(cache: Arc<ComputeCache>, transport: T) -> Self {
        Self { cache, transport }
    }

    pub fn cache(&self) -> &ComputeCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_identity(url: &str) -> CacheIdentity {
        CacheIdentity::new(HTTP_NAMESPACE, "GET").arg(url)
    }

    pub fn post_identity(url: &str, body: &str) -> CacheIdentity {
        CacheIdentity::new(HTTP_NAMESPACE, "POST").args([url, body])
    }

    /// # Errors
    /// `CacheError::FatalCompute` when the transport reports a fatal failure.
    pub async fn get(&self, url: &str) -> Result<ResultEnvelope<String>, CacheError> {
        self.cache
            .fetch(&Self::get_identity(url), || self.transport.get(url))
            .await
    }

    pub async fn get_with_delay(
        &self,
        url: &str,
        delay: Duration,
    ) -> Result<ResultEnvelope<String>, CacheError> {
        self.cache
            .fetch_with_delay(&Self::get_identity(url), delay, || self.transport.get(url))
            .await
    }

    /// # Errors
    /// `CacheError::FatalCompute` when the transport reports a fatal failure.
    pub async fn post(&self, url: &str, body: &str) -> Result<ResultEnvelope<String>, CacheError> {
        self.cache
            .fetch(&Self::post_identity(url, body), || {
                self.transport.post(url, body)
            })
            .await
    }

    pub async fn post_with_delay(
        &self,
        url: &str,
        body: &str,
        delay: Duration,
    ) -> Result<ResultEnvelope<String>, CacheError> {
        self.cache
            .fetch_with_delay(&Self::post_identity(url, body), delay, || {
                self.transport.post(url, body)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::config::{CacheConfig, SchedulerConfig};
    use crate::domain::{Action, TaskContext};
    use crate::error::{ComputeError, TaskError};
    use crate::impls::InMemoryCacheStore;
    use crate::scheduler::Scheduler;

    /// Transport answering from a fixed table and counting calls per URL.
    #[derive(Default)]
    struct TableTransport {
        responses: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl TableTransport {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                responses: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for TableTransport {
        async fn get(&self, url: &str) -> Result<Option<String>, ComputeError> {
            self.calls.lock().unwrap().push(url.to_string());
            if url.contains("unreachable") {
                return Err(std::io::Error::other("connection refused").into());
            }
            if url.contains("forbidden") {
                return Err(ComputeError::fatal("403 Forbidden"));
            }
            Ok(self.responses.get(url).cloned())
        }

        async fn post(&self, url: &str, body: &str) -> Result<Option<String>, ComputeError> {
            self.calls.lock().unwrap().push(format!("{url} {body}"));
            Ok(self.responses.get(body).cloned())
        }
    }

    fn fetcher(transport: TableTransport) -> CachedFetcher<TableTransport> {
        let cache = ComputeCache::new(Arc::new(InMemoryCacheStore::new()), CacheConfig::default());
        CachedFetcher::new(Arc::new(cache), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn get_is_cached_by_url() {
        let fetcher = fetcher(TableTransport::with(&[("https://api.example/blocks/1", "{\"n\":1}")]));

        let first = fetcher.get("https://api.example/blocks/1").await.unwrap();
        let second = fetcher.get("https://api.example/blocks/1").await.unwrap();

        assert_eq!(first.hint(), Action::WaitAndContinue);
        assert_eq!(second.hint(), Action::SkipDelay);
        assert_eq!(second.value().map(String::as_str), Some("{\"n\":1}"));
        assert_eq!(fetcher.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn post_keys_include_body() {
        let fetcher = fetcher(TableTransport::with(&[
            (r#"{"id":1}"#, "one"),
            (r#"{"id":2}"#, "two"),
        ]));

        let one = fetcher.post("https://rpc", r#"{"id":1}"#).await.unwrap();
        let two = fetcher.post("https://rpc", r#"{"id":2}"#).await.unwrap();

        assert_eq!(one.into_value().as_deref(), Some("one"));
        assert_eq!(two.into_value().as_deref(), Some("two"));
        assert_ne!(
            CachedFetcher::<TableTransport>::post_identity("https://rpc", "a").key("pacer"),
            CachedFetcher::<TableTransport>::get_identity("https://rpc").key("pacer"),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_host_degrades_to_no_value() {
        let fetcher = fetcher(TableTransport::default());

        let envelope = fetcher.get("https://unreachable.example").await.unwrap();

        assert!(envelope.value().is_none());
        assert_eq!(fetcher.transport().calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn forbidden_is_fatal() {
        let fetcher = fetcher(TableTransport::default());
        let err = fetcher.get("https://forbidden.example").await.unwrap_err();
        assert!(matches!(err, CacheError::FatalCompute { .. }));
        assert_eq!(fetcher.transport().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_pass_through_scheduler_skips_pacing() {
        let urls: Vec<String> = (0..4).map(|n| format!("https://api.example/blocks/{n}")).collect();
        let pairs: Vec<(&str, &str)> = urls.iter().map(|u| (u.as_str(), "{}")).collect();
        let fetcher = Arc::new(fetcher(TableTransport::with(&pairs)));
        let config = SchedulerConfig::with_task_delay(Duration::from_secs(1));

        let pass = |fetcher: Arc<CachedFetcher<TableTransport>>| {
            let mut scheduler = Scheduler::with_context(config.clone(), Arc::new(TaskContext::noop()));
            for url in &urls {
                let fetcher = Arc::clone(&fetcher);
                let url = url.clone();
                scheduler.add_fn(move |_ctx| async move {
                    Ok::<_, TaskError>(fetcher.get(&url).await?.hint())
                });
            }
            scheduler
        };

        let started = Instant::now();
        let cold = pass(Arc::clone(&fetcher)).run().await.unwrap();
        let cold_elapsed = started.elapsed();

        let started = Instant::now();
        let warm = pass(Arc::clone(&fetcher)).run().await.unwrap();
        let warm_elapsed = started.elapsed();

        assert_eq!((cold.paced, cold.unpaced), (4, 0));
        assert_eq!((warm.paced, warm.unpaced), (0, 4));
        assert!(cold_elapsed >= Duration::from_secs(3));
        assert!(warm_elapsed < Duration::from_millis(1));
        assert_eq!(fetcher.transport().calls(), 4);
    }
}
