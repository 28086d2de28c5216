//! Transport port - issues one remote call and returns its raw text.

use async_trait::async_trait;

use crate::error::ComputeError;

/// One blocking-style remote call per invocation.
///
/// Implementations classify their own failures: connection resets, timeouts
/// and other I/O trouble are `ComputeError::Transient`, everything else is
/// `ComputeError::Fatal`. `Ok(None)` means the remote side had no answer;
/// it is passed through and never cached.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<String>, ComputeError>;

    async fn post(&self, url: &str, body: &str) -> Result<Option<String>, ComputeError>;
}
