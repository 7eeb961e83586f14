//! Response cache with TTL expiry, LRU eviction and single-flight fetches.

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::flight::{self, Flight, FlightGroup};

/// Upper bound on a single TTL; anything longer is clamped.
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached upstream payload.
    pub value: V,

    /// When this entry was inserted.
    pub cached_at: Instant,

    /// Instant from which the entry is stale.
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Create an entry that expires `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            cached_at: now,
            expires_at: now + ttl.min(MAX_TTL),
        }
    }

    /// Whether the entry is stale at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before the entry goes stale.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// How a read-through lookup was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh cache entry.
    Hit,
    /// Fetched from upstream by this caller.
    Miss,
    /// Served from another caller's concurrent upstream fetch.
    Coalesced,
}

impl CacheStatus {
    /// Short label suitable for an `X-Cache` style header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Coalesced => "COALESCED",
        }
    }

    /// Whether upstream was avoided for this caller.
    pub fn is_cached(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value returned by [`ResponseCache::get_or_fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<V> {
    pub value: V,
    pub status: CacheStatus,
}

impl<V> Lookup<V> {
    fn new(value: V, status: CacheStatus) -> Self {
        Self { value, status }
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    upstream_calls: AtomicU64,
    expired: AtomicU64,
    evicted: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Response cache keyed by request identity.
///
/// This cache provides:
/// - TTL-based staleness, checked lazily on lookup
/// - LRU eviction once `max_entries` is reached
/// - Single-flight read-through fetches (configurable)
/// - Hit/miss counters
///
/// Construct one per owning service and pass it to whatever needs it;
/// clones share the same underlying entries.
pub struct ResponseCache<V> {
    entries: Arc<Mutex<LruCache<String, CacheEntry<V>>>>,
    flights: Arc<FlightGroup<V>>,
    counters: Arc<Counters>,
    config: CacheConfig,
}

impl<V: Clone + Send + Sync + 'static> ResponseCache<V> {
    /// Create a new response cache.
    pub fn new(config: CacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Arc::new(Mutex::new(LruCache::new(cap))),
            flights: Arc::new(FlightGroup::new()),
            counters: Arc::new(Counters::default()),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current number of stored entries, including stale ones not yet looked up.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Get a fresh value for `key`.
    ///
    /// A stale entry is removed and reported as absent. Reading never
    /// extends an entry's expiry.
    pub async fn get(&self, key: &str) -> Option<V> {
        let value = self.fresh_value(key).await;
        if value.is_some() {
            trace!(key = %key, "Cache hit");
            Counters::bump(&self.counters.hits);
        } else {
            trace!(key = %key, "Cache miss");
            Counters::bump(&self.counters.misses);
        }
        value
    }

    /// Store `value` under `key`, expiring `ttl` from now.
    ///
    /// Overwrites any existing entry. If the cache is full, the least
    /// recently used entry is evicted.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self.entries.lock().await;

        if let Some((old_key, _)) = entries.push(key.clone(), CacheEntry::new(value, ttl))
            && old_key != key
        {
            debug!(key = %old_key, "Evicting least recently used entry to make room");
            Counters::bump(&self.counters.evicted);
        }

        trace!(
            key = %key,
            ttl_ms = ttl.as_millis() as u64,
            cache_size = entries.len(),
            "Entry stored"
        );
    }

    /// Store `value` under `key` with the configured default TTL.
    pub async fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.config.default_ttl).await;
    }

    /// Check if a fresh entry exists, without touching LRU order or counters.
    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .peek(key)
            .is_some_and(|e| !e.is_expired_at(Instant::now()))
    }

    /// Peek at a fresh entry without touching LRU order or counters.
    pub async fn peek_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let entries = self.entries.lock().await;
        entries
            .peek(key)
            .filter(|e| !e.is_expired_at(Instant::now()))
            .cloned()
    }

    /// Remove an entry, returning its value if it was still fresh.
    pub async fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        entries
            .pop(key)
            .filter(|e| !e.is_expired_at(Instant::now()))
            .map(|e| e.value)
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Remove all stale entries now and return how many were dropped.
    ///
    /// Expiry is otherwise lazy; nothing calls this automatically.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            entries.pop(key);
        }

        let count = stale.len();
        if count > 0 {
            debug!(count = count, "Purged expired entries");
            self.counters
                .expired
                .fetch_add(count as u64, Ordering::Relaxed);
        }
        count
    }

    /// Read-through lookup.
    ///
    /// Returns the cached value on a hit. On a miss, calls `fetch`, stores
    /// a successful result for `ttl` and returns it. Failed fetches are not
    /// cached. With single-flight enabled, concurrent misses for the same
    /// key wait for the first caller's fetch instead of calling upstream.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Lookup<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: fmt::Display,
    {
        if let Some(value) = self.fresh_value(key).await {
            return Ok(self.hit(value));
        }

        if !self.config.single_flight {
            let value = self.fetch_and_store(key, ttl, fetch).await;
            Counters::bump(&self.counters.misses);
            return value.map(|value| Lookup::new(value, CacheStatus::Miss));
        }

        loop {
            match self.flights.join(key) {
                Flight::Leader(guard) => {
                    // A previous leader may have stored the value after our miss.
                    if let Some(value) = self.fresh_value(key).await {
                        guard.complete(Ok(value.clone()));
                        return Ok(self.hit(value));
                    }

                    let result = self.fetch_and_store(key, ttl, fetch).await;
                    guard.complete(result.clone());
                    Counters::bump(&self.counters.misses);
                    return result.map(|value| Lookup::new(value, CacheStatus::Miss));
                }
                Flight::Follower(rx) => {
                    trace!(key = %key, "Waiting on in-flight upstream call");
                    match flight::wait(rx).await {
                        Some(result) => {
                            Counters::bump(&self.counters.misses);
                            Counters::bump(&self.counters.coalesced);
                            return result
                                .map(|value| Lookup::new(value, CacheStatus::Coalesced));
                        }
                        None => {
                            debug!(key = %key, "In-flight upstream call abandoned, retrying");
                        }
                    }
                }
            }
        }
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let size = self.entries.lock().await.len();
        let c = &self.counters;
        CacheStats {
            size,
            capacity: self.config.max_entries,
            in_flight: self.flights.len(),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            upstream_calls: c.upstream_calls.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
            evicted: c.evicted.load(Ordering::Relaxed),
        }
    }

    fn hit(&self, value: V) -> Lookup<V> {
        Counters::bump(&self.counters.hits);
        Lookup::new(value, CacheStatus::Hit)
    }

    /// Look up a fresh value, dropping a stale entry. Does not count hits or misses.
    async fn fresh_value(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let fresh = entries
            .get(key)
            .map(|e| (!e.is_expired_at(now)).then(|| e.value.clone()));

        match fresh {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                debug!(key = %key, "Entry expired, removing from cache");
                Counters::bump(&self.counters.expired);
                None
            }
            None => None,
        }
    }

    async fn fetch_and_store<F, Fut, E>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: fmt::Display,
    {
        Counters::bump(&self.counters.upstream_calls);
        debug!(key = %key, "Calling upstream");

        match fetch().await {
            Ok(value) => {
                self.set(key, value.clone(), ttl).await;
                Ok(value)
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Upstream call failed, not caching");
                Err(CacheError::Upstream(e.to_string()))
            }
        }
    }
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            flights: Arc::clone(&self.flights),
            counters: Arc::clone(&self.counters),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Current number of stored entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Keys with an upstream call in progress.
    pub in_flight: usize,

    /// Lookups served from a fresh entry.
    pub hits: u64,

    /// Lookups that found nothing fresh.
    pub misses: u64,

    /// Read-through calls served by another caller's fetch.
    pub coalesced: u64,

    /// Upstream fetches performed.
    pub upstream_calls: u64,

    /// Entries dropped because their TTL passed.
    pub expired: u64,

    /// Entries dropped to respect the size bound.
    pub evicted: u64,
}

impl CacheStats {
    /// Fraction of lookups served from cache, or 0 with no lookups.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
