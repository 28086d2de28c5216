use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a `CacheStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache store rejected write for key={key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Failure of a single compute attempt, classified by the caller.
///
/// - `Transient`: worth retrying (I/O-style failure of the underlying transport).
/// - `Fatal`: anything else; never retried, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl ComputeError {
    pub fn transient(reason: impl fmt::Display) -> Self {
        Self::Transient(reason.to_string())
    }

    pub fn fatal(reason: impl fmt::Display) -> Self {
        Self::Fatal(reason.to_string())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<std::io::Error> for ComputeError {
    fn from(err: std::io::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

/// Error surfaced by `ComputeCache`.
///
/// Cache corruption, store outages and exhausted retries all degrade to an
/// absent value instead; only a fatal compute failure reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("fatal compute failure for key={key}: {reason}")]
    FatalCompute { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode cache value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("decode cache value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Error returned from a scheduled task body.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Ends the whole run; surfaced from `SchedulerHandle::join`.
    #[error(transparent)]
    Fatal(#[from] CacheError),

    /// Logged and isolated; the run continues with the standard pacing delay.
    #[error("task failed: {0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler requires at least one track")]
    NoTracks,

    #[error("run aborted: {0}")]
    Fatal(#[source] CacheError),

    #[error("scheduler loop failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
