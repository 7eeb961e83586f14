//! Configuration for the response cache.

use std::time::Duration;

use crate::ttl;

/// Default maximum number of entries before LRU eviction.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Default TTL used by [`ResponseCache::set_default`](crate::ResponseCache::set_default).
pub const DEFAULT_TTL: Duration = ttl::VOLATILE;

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries to keep before evicting the least recently used.
    pub max_entries: usize,

    /// TTL applied when the caller does not pass one.
    pub default_ttl: Duration,

    /// Whether concurrent misses for the same key share one upstream call.
    /// When false, every miss calls upstream.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            single_flight: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable or disable single-flight deduplication of upstream calls.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}
