//! Caching layer for latest-state projections
//!
//! Deriving a subject's current profile means scanning its chain backwards.
//! The cache keeps the last scan per chain, stamped with the chain length and
//! latest hash, so any append invalidates the entry without explicit calls.
use crate::blockchain::{Chain, ChainKind, ProfileRecord};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

type CacheKey = (ChainKind, String);

#[derive(Debug, Clone)]
struct CachedProjection {
    length: usize,
    latest_hash: Option<String>,
    record: Option<ProfileRecord>,
}

impl CachedProjection {
    fn is_current(&self, chain: &Chain) -> bool {
        self.length == chain.len() && self.latest_hash.as_deref() == chain.latest_hash()
    }
}

/// Thread-safe LRU of backward-scan results
pub struct ProjectionCache {
    inner: Mutex<LruCache<CacheKey, CachedProjection>>,
}

impl ProjectionCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let capacity_nz = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity_nz)),
        }
    }

    /// Latest profile of `chain`, scanning only when the cached entry is stale
    pub fn latest_profile(&self, chain: &Chain) -> Option<ProfileRecord> {
        let key = (chain.kind(), chain.subject_id().to_string());
        let mut cache = self.inner.lock();

        if let Some(entry) = cache.get(&key) {
            if entry.is_current(chain) {
                return entry.record.clone();
            }
        }

        let record = chain.latest_profile();
        cache.put(
            key,
            CachedProjection {
                length: chain.len(),
                latest_hash: chain.latest_hash().map(str::to_string),
                record: record.clone(),
            },
        );
        record
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }
}

impl Default for ProjectionCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for ProjectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
