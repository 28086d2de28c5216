//! Runtime configuration.
//!
//! Built once and handed to `ComputeCache::new` / `Scheduler::new`. Every
//! field has a default, so a config file only needs the values it changes.
//!
//! ```json
//! {
//!   "cache": { "key_prefix": "mainnet", "compute_delay_ms": 100 },
//!   "scheduler": { "task_delay_ms": 500 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
}

impl PacerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

/// Settings for `ComputeCache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// First segment of every cache key.
    pub key_prefix: String,

    /// Pause before the first compute attempt of a cache miss.
    pub compute_delay_ms: u64,

    /// Total compute attempts on transient failures (first one included).
    pub max_attempts: u32,

    /// Backoff delay after the first failed attempt.
    pub backoff_base_ms: u64,

    /// Linear backoff growth per attempt.
    pub backoff_step: u32,
}

impl CacheConfig {
    pub fn compute_delay(&self) -> Duration {
        Duration::from_millis(self.compute_delay_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "pacer".to_string(),
            compute_delay_ms: 75,
            max_attempts: 5,
            backoff_base_ms: 75,
            backoff_step: 10,
        }
    }
}

/// Settings for `Scheduler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay after a task that returned `WaitAndContinue` (or failed).
    pub task_delay_ms: u64,

    /// Poll interval while waiting for the loop to terminate.
    pub shutdown_poll_ms: u64,

    /// Upper bound on that wait before outstanding work is cancelled.
    pub shutdown_timeout_ms: u64,
}

impl SchedulerConfig {
    pub fn with_task_delay(task_delay: Duration) -> Self {
        Self {
            task_delay_ms: u64::try_from(task_delay.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    pub fn task_delay(&self) -> Duration {
        Duration::from_millis(self.task_delay_ms)
    }

    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_delay_ms: 250,
            shutdown_poll_ms: 500,
            shutdown_timeout_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = PacerConfig::default();
        assert_eq!(config.cache.key_prefix, "pacer");
        assert_eq!(config.cache.compute_delay(), Duration::from_millis(75));
        assert_eq!(config.cache.max_attempts, 5);
        assert_eq!(config.scheduler.shutdown_timeout(), Duration::from_secs(60));
        assert_eq!(config.scheduler.shutdown_poll(), Duration::from_millis(500));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"
        {
          "cache": { "key_prefix": "mainnet" },
          "scheduler": { "task_delay_ms": 1000 }
        }"#;
        let config = PacerConfig::from_json_str(json).expect("parse");
        assert_eq!(config.cache.key_prefix, "mainnet");
        assert_eq!(config.cache.max_attempts, 5);
        assert_eq!(config.scheduler.task_delay(), Duration::from_secs(1));
        assert_eq!(config.scheduler.shutdown_timeout_ms, 60_000);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config = PacerConfig::from_json_str(r#"{ "rpc_nodes": {"eth": "http://x"} }"#)
            .expect("parse");
        assert_eq!(config, PacerConfig::default());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PacerConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
