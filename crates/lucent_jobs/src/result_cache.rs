//! Bounded cache of completed results, keyed by fingerprint.

use parking_lot::Mutex;

use lucent_core::LruCache;

use crate::job::JobResult;

/// LRU of fingerprint to [`JobResult`].
///
/// Shared between submission (hit check) and the worker (insert on success),
/// so the inner cache sits behind a mutex. Capacity 0 disables caching.
pub struct ResultCache {
    inner: Mutex<LruCache<String, JobResult>>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a fingerprint, refreshing its recency on a hit.
    pub fn get(&self, fingerprint: &str) -> Option<JobResult> {
        self.inner.lock().get(&fingerprint.to_string()).cloned()
    }

    /// Store a result, evicting the least-recently-used entry if full.
    pub fn put(&self, fingerprint: String, result: JobResult) {
        if let Some((evicted, _)) = self.inner.lock().put(fingerprint, result) {
            tracing::debug!(%evicted, "evicted cached result");
        }
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
