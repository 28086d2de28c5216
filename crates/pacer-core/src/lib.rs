//! pacer-core
//!
//! Building blocks for rate-limited batch pipelines against remote APIs.
//!
//! - **domain**: cache keys, actions, result envelopes, run context, lifecycle states
//! - **ports**: capabilities consumed from outside (`CacheStore`, `Transport`)
//! - **impls**: in-process port implementations (`InMemoryCacheStore`)
//! - **cache**: `ComputeCache`, the cache-aside wrapper with bounded retry
//! - **scheduler**: `Scheduler`, the single-flight multi-track drain loop
//! - **app**: helpers built on the above (`CachedFetcher`)
//! - **config**, **error**, **observability**: ambient types

pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod scheduler;

pub use self::app::CachedFetcher;
pub use self::cache::ComputeCache;
pub use self::config::{CacheConfig, PacerConfig, SchedulerConfig};
pub use self::domain::{
    Action, CacheIdentity, CacheKey, ResultEnvelope, SchedulerState, StopReason, TaskContext,
};
pub use self::error::{
    CacheError, ComputeError, ConfigError, SchedulerError, StoreError, TaskError,
};
pub use self::impls::InMemoryCacheStore;
pub use self::observability::{CacheStats, RunReport};
pub use self::ports::{CacheStore, Transport};
pub use self::scheduler::{Scheduler, SchedulerHandle, Task, Track, task_fn};
