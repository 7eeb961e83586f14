//! Upstream response cache with TTL expiry, LRU bound and single-flight.
//!
//! This crate sits in front of slow or rate-limited third-party data
//! providers (page analysis, map search, geographic lookups) and provides:
//! - Lazy TTL expiry: stale entries are dropped the next time they are read
//! - LRU eviction to keep memory bounded
//! - Single-flight: concurrent misses for one key share one upstream call
//! - Hit/miss status reported back to the caller
//!
//! # Example
//!
//! ```rust,ignore
//! use vantage_cache::{CacheConfig, CacheKey, ResponseCache, ttl};
//!
//! let cache = ResponseCache::new(CacheConfig::default().with_max_entries(512));
//! let key = CacheKey::new("places/search").param("q", "coffee").build();
//!
//! let lookup = cache
//!     .get_or_fetch(&key, ttl::VOLATILE, || places.search("coffee"))
//!     .await?;
//! println!("{} ({})", lookup.value, lookup.status);
//! ```

mod cache;
mod config;
mod error;
mod flight;
mod key;
pub mod ttl;

pub use cache::{CacheEntry, CacheStats, CacheStatus, Lookup, ResponseCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use key::CacheKey;
