//! Content-addressed cache keys.
//!
//! A key is a pure function of the call identity:
//! `<prefix>:<namespace>:<method>:<version>:<sha256-hex>`, where the digest
//! covers the lower-cased, whitespace-stripped, `:`-joined argument list.
//! Nothing time- or process-dependent goes into it, so two processes that
//! issue the same call share the entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of one remote call: who is called, how, and with what.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheIdentity {
    namespace: String,
    method: String,
    version: u32,
    args: Vec<String>,
}

impl CacheIdentity {
    /// Identity with version 0 and no arguments.
    pub fn new(namespace: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            method: method.into(),
            version: 0,
            args: Vec::new(),
        }
    }

    /// Bump this when the shape of the cached value changes.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn version_number(&self) -> u32 {
        self.version
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn key(&self, prefix: &str) -> CacheKey {
        derive_key(prefix, self)
    }
}

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex digest segment (everything after the last `:`).
    pub fn digest(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the key for `identity` under `prefix`.
pub fn derive_key(prefix: &str, identity: &CacheIdentity) -> CacheKey {
    let digest = Sha256::digest(normalize_args(&identity.args).as_bytes());
    CacheKey(format!(
        "{prefix}:{}:{}:{}:{}",
        identity.namespace,
        identity.method,
        identity.version,
        hex::encode(digest)
    ))
}

// `:` between arguments keeps ("ab", "c") and ("a", "bc") apart.
fn normalize_args(args: &[String]) -> String {
    args.join(":")
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
