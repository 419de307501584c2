//! Bounded, insertion-ordered cache of decoded asset handles keyed by locator.
//!
//! Structure: IndexMap<String, AssetHandle>
//! - Insertion order is the eviction order (FIFO)
//! - Lookups never refresh recency
//! - Duplicate inserts are ignored (first write wins)
//!
//! One process-wide instance is reachable through [`AssetCache::shared`];
//! players can also be handed an isolated instance.

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::engine::AssetHandle;

/// Default number of cached assets.
pub const DEFAULT_CAPACITY: usize = 10;

static SHARED: Lazy<Arc<AssetCache>> = Lazy::new(|| Arc::new(AssetCache::new(DEFAULT_CAPACITY)));

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// Locator -> asset handle cache with FIFO eviction.
#[derive(Debug)]
pub struct AssetCache {
    entries: Mutex<IndexMap<String, AssetHandle>>,
    capacity: AtomicUsize,
    stats: CacheStats,
}

impl AssetCache {
    pub fn new(capacity: usize) -> Self {
        debug!("AssetCache created: capacity={}", capacity);
        Self {
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
            capacity: AtomicUsize::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Process-wide instance, created on first access and never torn down.
    pub fn shared() -> Arc<AssetCache> {
        Arc::clone(&SHARED)
    }

    /// Set the capacity of the process-wide instance.
    pub fn configure_shared(capacity: usize) {
        SHARED.set_capacity(capacity);
    }

    /// Insert `handle` under `key` unless the key is already cached.
    ///
    /// Returns true if inserted. Overflow evicts the oldest entries.
    pub fn put(&self, key: &str, handle: AssetHandle) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(key) {
            debug!("Asset already cached: {}", key);
            return false;
        }
        entries.insert(key.to_string(), handle);
        self.evict_overflow(&mut entries);
        true
    }

    /// Lookup without touching insertion order.
    pub fn get(&self, key: &str) -> Option<AssetHandle> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let found = entries.get(key).cloned();
        if found.is_some() {
            self.stats.record_hit();
            debug!("Asset cache hit: {}", key);
        } else {
            self.stats.record_miss();
            debug!("Asset cache miss: {}", key);
        }
        found
    }

    /// Get the cached handle or build and insert one under a single lock.
    ///
    /// Returns (handle, was_inserted). With capacity 0 the built handle is
    /// returned but not retained.
    pub fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> AssetHandle) -> (AssetHandle, bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(key) {
            self.stats.record_hit();
            debug!("Asset cache hit: {}", key);
            return (existing.clone(), false);
        }
        self.stats.record_miss();
        debug!("Asset caching: {}", key);

        let handle = make();
        entries.insert(key.to_string(), handle.clone());
        self.evict_overflow(&mut entries);
        (handle, true)
    }

    fn evict_overflow(&self, entries: &mut IndexMap<String, AssetHandle>) {
        let capacity = self.capacity();
        if entries.len() > capacity {
            let count = entries.len() - capacity;
            for (key, _) in entries.drain(..count) {
                debug!("Asset evicted: {}", key);
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached locators, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Takes effect on the next insert; nothing is evicted now.
    pub fn set_capacity(&self, capacity: usize) {
        let old = self.capacity.swap(capacity, Ordering::Relaxed);
        if old != capacity {
            debug!("AssetCache capacity: {} -> {}", old, capacity);
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
