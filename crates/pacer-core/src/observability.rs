use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::StopReason;

/// Snapshot of `ComputeCache` counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries deleted because they were empty, null or undecodable.
    pub evictions: u64,
    /// Compute invocations, retries included.
    pub compute_attempts: u64,
    pub transient_failures: u64,
    pub fatal_failures: u64,
    pub write_failures: u64,
}

impl CacheStats {
    /// Hits over lookups; 0.0 before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub compute_attempts: AtomicU64,
    pub transient_failures: AtomicU64,
    pub fatal_failures: AtomicU64,
    pub write_failures: AtomicU64,
}

impl CacheCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            compute_attempts: self.compute_attempts.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            fatal_failures: self.fatal_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Summary of one scheduler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub reason: StopReason,
    /// Tasks invoked, failed ones included.
    pub executed: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
    /// Tasks followed by the inter-task delay.
    pub paced: usize,
    /// Tasks that returned `SkipDelay`.
    pub unpaced: usize,
    /// Tasks never started because the run stopped early.
    pub remaining: usize,
    /// Work cancelled by the shutdown timeout (queued tasks plus one in flight).
    pub cancelled: usize,
}
