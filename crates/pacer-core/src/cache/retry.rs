//! Retry policy: attempt bound and backoff delays for transient compute failures.

use std::time::Duration;

use crate::config::CacheConfig;

/// Retry policy for transient compute failures.
///
/// Backoff grows linearly with the attempt index:
/// `delay = base_delay * (1 + (attempts - 1) * step)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Linear growth factor per further attempt.
    pub step: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.backoff_base(),
            step: config.backoff_step,
        }
    }

    /// Delay before the next attempt.
    ///
    /// # Arguments
    /// * `attempts` - Number of attempts already made (1-indexed).
    ///
    /// Example with base_delay=75ms, step=10:
    /// - after attempt 1: 75ms
    /// - after attempt 2: 825ms
    /// - after attempt 3: 1575ms
    /// - after attempt 4: 2325ms
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let factor = attempts
            .saturating_sub(1)
            .saturating_mul(self.step)
            .saturating_add(1);
        self.base_delay.saturating_mul(factor)
    }

    /// Is there an attempt left after `attempts` failures?
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
