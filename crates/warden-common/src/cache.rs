//! Time-bounded caching with explicit invalidation hooks.
//!
//! Every cache in the workspace is one of these, constructed by the component
//! that owns it and invalidated from that component's mutation paths. There is
//! no process-global cache state.

use moka::future::Cache;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, warn};

/// Default TTL for resolution and configuration caches.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of entries held by a cache.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// A key/value cache whose entries expire a fixed time after insertion.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    ttl: Duration,
    inner: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with the default capacity.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_capacity(name, ttl, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a cache holding at most `max_capacity` entries.
    pub fn with_capacity(name: &'static str, ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .name(name)
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self { name, ttl, inner }
    }

    /// Returns the cached value if present and not expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Inserts or replaces a value, restarting its TTL.
    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Drops a single entry.
    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    /// Drops every entry matching `predicate`.
    ///
    /// Matching entries are never returned by [`get`](Self::get) once this
    /// returns, even though their memory is reclaimed in the background.
    pub fn invalidate_where<F>(&self, predicate: F)
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        if let Err(e) = self.inner.invalidate_entries_if(predicate) {
            warn!(cache = self.name, error = %e, "Predicate invalidation rejected, clearing cache");
            self.inner.invalidate_all();
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        debug!(cache = self.name, "Clearing cache");
        self.inner.invalidate_all();
    }

    /// The fixed time-to-live of this cache.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cache name used in log output.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
