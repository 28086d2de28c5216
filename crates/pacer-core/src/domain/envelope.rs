//! ResultEnvelope: one call's outcome plus where it came from.
//!
//! This is the seam between the cache and the scheduler. A task body that goes
//! through `ComputeCache::fetch` gets an envelope back and returns
//! `envelope.hint()`, so pacing follows the live-call/cache-hit ratio of the
//! batch without any extra bookkeeping.

use super::action::Action;
use super::cache_key::CacheKey;

/// Outcome of a single call. Built per call, consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope<T> {
    value: Option<T>,
    cache_hit: bool,
    cache_key: String,
}

impl<T> ResultEnvelope<T> {
    /// Value served from the cache.
    pub fn hit(value: T, key: &CacheKey) -> Self {
        Self {
            value: Some(value),
            cache_hit: true,
            cache_key: key.to_string(),
        }
    }

    /// Value obtained by a live call. `stored_under` is the key it was written
    /// to, if the write happened.
    pub fn live(value: Option<T>, stored_under: Option<&CacheKey>) -> Self {
        Self {
            value,
            cache_hit: false,
            cache_key: stored_under.map(ToString::to_string).unwrap_or_default(),
        }
    }

    /// Value from a call that bypassed the cache entirely.
    pub fn uncached(value: Option<T>) -> Self {
        Self::live(value, None)
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn is_cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Empty when the value is not in the cache.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Cache hit: the call consumed no quota, skip the delay.
    /// Cache miss: a live call was made, pace the next task.
    pub fn hint(&self) -> Action {
        if self.cache_hit {
            Action::SkipDelay
        } else {
            Action::WaitAndContinue
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResultEnvelope<U> {
        ResultEnvelope {
            value: self.value.map(f),
            cache_hit: self.cache_hit,
            cache_key: self.cache_key,
        }
    }
}

impl<T> From<&ResultEnvelope<T>> for Action {
    fn from(envelope: &ResultEnvelope<T>) -> Self {
        envelope.hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CacheIdentity;

    fn key() -> CacheKey {
        CacheIdentity::new("chain1", "getBlock").arg("100").key("pacer")
    }

    #[test]
    fn hit_skips_delay() {
        let env = ResultEnvelope::hit(42u64, &key());
        assert_eq!(env.hint(), Action::SkipDelay);
        assert_eq!(env.cache_key(), key().as_str());
        assert_eq!(env.value(), Some(&42));
    }

    #[test]
    fn live_call_waits_even_when_stored() {
        let env = ResultEnvelope::live(Some(42u64), Some(&key()));
        assert_eq!(env.hint(), Action::WaitAndContinue);
        assert!(!env.cache_key().is_empty());
    }

    #[test]
    fn uncached_has_empty_key_and_waits() {
        let env: ResultEnvelope<u64> = ResultEnvelope::uncached(None);
        assert_eq!(env.cache_key(), "");
        assert_eq!(Action::from(&env), Action::WaitAndContinue);
        assert!(env.into_value().is_none());
    }

    #[test]
    fn map_keeps_cache_status() {
        let env = ResultEnvelope::hit("0x2a".to_string(), &key()).map(|s| s.len());
        assert!(env.is_cache_hit());
        assert_eq!(env.into_value(), Some(4));
    }
}
