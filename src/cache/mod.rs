//! Cache module for keeping the last known prices per currency
//!
//! This module provides a price cache over a pluggable key-value store, with
//! a staleness window and a bound on how many currencies are retained. It
//! supports graceful degradation: callers can read entries past their
//! freshness window when the market API is unavailable.

mod codec;
mod manager;
mod store;

pub use manager::{
    CacheError, CacheLookup, CacheStats, CachedPrices, PriceCache, CACHE_KEY_PREFIX,
    DEFAULT_MAX_ENTRIES, DEFAULT_TTL_MINUTES,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
