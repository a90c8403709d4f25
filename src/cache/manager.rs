//! Price cache with staleness detection and bounded retention
//!
//! Provides a `PriceCache` that stores the last successful price list per
//! currency in a [`KeyValueStore`], supporting graceful degradation when the
//! market API is unavailable.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::codec;
use super::store::{KeyValueStore, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::data::CurrencyRecord;

/// Prefix shared by every key the cache writes
pub const CACHE_KEY_PREFIX: &str = "crypto-prices-cache";

/// Suffix of the key holding the encoded records
const DATA_KEY_SUFFIX: &str = "-data";

/// How long an entry is considered fresh
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// Maximum number of currencies kept at once
pub const DEFAULT_MAX_ENTRIES: usize = 10;

/// Errors surfaced by the fallible cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store failed
    #[error("Cache storage failed: {0}")]
    Storage(#[from] StoreError),

    /// Stored metadata or records could not be parsed
    #[error("Cached data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Metadata stored next to the encoded records
#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    /// Always empty; records live under the `-data` key
    #[serde(default)]
    data: Vec<serde_json::Value>,
    /// Milliseconds since the Unix epoch
    timestamp: i64,
    currency: String,
    #[serde(default)]
    compressed: bool,
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Entry exists and is within the staleness window
    Fresh(Vec<CurrencyRecord>),
    /// Entry exists but is older than the staleness window
    Stale,
    /// No entry for this currency
    Missing,
}

/// Records read back from the cache along with when they were written
#[derive(Debug, Clone)]
pub struct CachedPrices {
    pub records: Vec<CurrencyRecord>,
    pub cached_at: DateTime<Utc>,
}

/// Summary of what the cache currently holds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of cached currencies
    pub size: usize,
    /// Lowercase currency codes with an entry
    pub currencies: Vec<String>,
    /// Total bytes stored across metadata and data keys
    pub total_size: usize,
}

/// Tunables for [`PriceCache`]
#[derive(Debug, Clone)]
struct CacheConfig {
    /// Age after which an entry is stale
    ttl: Duration,
    /// Maximum number of currencies retained
    max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Stores the latest price list per currency
///
/// Each currency uses two keys: `crypto-prices-cache-<currency>` holds JSON
/// metadata (timestamp, currency, compressed flag), and
/// `crypto-prices-cache-<currency>-data` holds the compact record array.
/// After every write the oldest entries beyond `max_entries` are evicted.
///
/// `set`, `get`, `clear`, and `clear_all` never fail: storage and parse
/// errors are logged and treated as a cache miss. `try_set` and `lookup`
/// expose the same operations with explicit results.
#[derive(Debug, Clone)]
pub struct PriceCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl PriceCache {
    /// Creates a cache over `store` using the system clock and default settings
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: CacheConfig::default(),
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn cache_key(currency: &str) -> String {
        format!("{}-{}", CACHE_KEY_PREFIX, currency.trim().to_lowercase())
    }

    fn data_key(meta_key: &str) -> String {
        format!("{}{}", meta_key, DATA_KEY_SUFFIX)
    }

    fn is_meta_key(key: &str) -> bool {
        key.starts_with(CACHE_KEY_PREFIX) && !key.ends_with(DATA_KEY_SUFFIX)
    }

    fn read_metadata(&self, meta_key: &str) -> Result<Option<CacheMetadata>, CacheError> {
        match self.store.get_item(meta_key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn age_of(&self, metadata: &CacheMetadata) -> Duration {
        self.clock.now() - timestamp_to_datetime(metadata.timestamp)
    }

    /// Writes `records` as the entry for `currency`, then enforces the size bound
    pub fn try_set(&self, currency: &str, records: &[CurrencyRecord]) -> Result<(), CacheError> {
        let meta_key = Self::cache_key(currency);
        let metadata = CacheMetadata {
            data: Vec::new(),
            timestamp: self.clock.now().timestamp_millis(),
            currency: currency.trim().to_lowercase(),
            compressed: true,
        };

        let encoded = codec::encode(records)?;
        let meta = serde_json::to_string(&metadata)?;

        // Metadata goes last: its timestamp must never describe older records
        self.store.set_item(&Self::data_key(&meta_key), &encoded)?;
        if let Err(e) = self.store.set_item(&meta_key, &meta) {
            self.clear(currency);
            return Err(e.into());
        }

        debug!(currency = %metadata.currency, count = records.len(), "cached prices");

        self.evict_oldest(&meta_key)
    }

    /// Writes `records` as the entry for `currency`, logging any failure
    pub fn set(&self, currency: &str, records: &[CurrencyRecord]) {
        if let Err(e) = self.try_set(currency, records) {
            warn!(currency, error = %e, "failed to cache crypto data");
        }
    }

    /// Looks up the entry for `currency` without modifying the cache
    pub fn lookup(&self, currency: &str) -> Result<CacheLookup, CacheError> {
        let meta_key = Self::cache_key(currency);

        let Some(metadata) = self.read_metadata(&meta_key)? else {
            return Ok(CacheLookup::Missing);
        };
        let Some(raw) = self.store.get_item(&Self::data_key(&meta_key))? else {
            return Ok(CacheLookup::Missing);
        };

        if self.age_of(&metadata) >= self.config.ttl {
            return Ok(CacheLookup::Stale);
        }

        Ok(CacheLookup::Fresh(codec::decode(&raw)?))
    }

    /// Returns the cached records if they are still fresh
    ///
    /// Stale and corrupt entries are removed and reported as `None`.
    pub fn get(&self, currency: &str) -> Option<Vec<CurrencyRecord>> {
        match self.lookup(currency) {
            Ok(CacheLookup::Fresh(records)) => Some(records),
            Ok(CacheLookup::Missing) => None,
            Ok(CacheLookup::Stale) => {
                debug!(currency, "cache entry is stale, clearing");
                self.clear(currency);
                None
            }
            Err(e) => {
                warn!(currency, error = %e, "failed to retrieve cached crypto data");
                self.clear(currency);
                None
            }
        }
    }

    /// Returns the cached records if they are no older than `max_age`
    ///
    /// Ignores the staleness window and never clears anything, so callers can
    /// fall back to data past its freshness but still recent enough to show.
    pub fn recent(&self, currency: &str, max_age: Duration) -> Option<CachedPrices> {
        let read = || -> Result<Option<CachedPrices>, CacheError> {
            let meta_key = Self::cache_key(currency);
            let Some(metadata) = self.read_metadata(&meta_key)? else {
                return Ok(None);
            };
            if self.age_of(&metadata) > max_age {
                return Ok(None);
            }
            let Some(raw) = self.store.get_item(&Self::data_key(&meta_key))? else {
                return Ok(None);
            };
            Ok(Some(CachedPrices {
                records: codec::decode(&raw)?,
                cached_at: timestamp_to_datetime(metadata.timestamp),
            }))
        };

        read().unwrap_or_else(|e| {
            warn!(currency, error = %e, "failed to read cached crypto data");
            None
        })
    }

    /// Metadata of a complete entry; `None` if either key is absent or unreadable
    fn entry_metadata(&self, currency: &str) -> Option<CacheMetadata> {
        let meta_key = Self::cache_key(currency);
        let metadata = self.read_metadata(&meta_key).ok().flatten()?;
        match self.store.get_item(&Self::data_key(&meta_key)) {
            Ok(Some(_)) => Some(metadata),
            _ => None,
        }
    }

    /// When the entry for `currency` was written, regardless of staleness
    pub fn last_updated(&self, currency: &str) -> Option<DateTime<Utc>> {
        self.entry_metadata(currency)
            .map(|metadata| timestamp_to_datetime(metadata.timestamp))
    }

    /// True when there is no usable entry or it is past the staleness window
    pub fn is_stale(&self, currency: &str) -> bool {
        match self.entry_metadata(currency) {
            Some(metadata) => self.age_of(&metadata) >= self.config.ttl,
            None => true,
        }
    }

    /// Removes the entry for one currency
    pub fn clear(&self, currency: &str) {
        let meta_key = Self::cache_key(currency);
        let result = self
            .store
            .remove_item(&meta_key)
            .and_then(|()| self.store.remove_item(&Self::data_key(&meta_key)));

        if let Err(e) = result {
            warn!(currency, error = %e, "failed to clear crypto cache for currency");
        }
    }

    /// Removes every cache entry, leaving unrelated keys alone
    pub fn clear_all(&self) {
        let result = self.store.keys().and_then(|keys| {
            keys.iter()
                .filter(|key| key.starts_with(CACHE_KEY_PREFIX))
                .try_for_each(|key| self.store.remove_item(key))
        });

        if let Err(e) = result {
            warn!(error = %e, "failed to clear crypto cache");
        }
    }

    /// Reports cached currencies and their total stored size
    pub fn stats(&self) -> CacheStats {
        let collect = || -> Result<CacheStats, StoreError> {
            let keys: Vec<String> = self
                .store
                .keys()?
                .into_iter()
                .filter(|key| key.starts_with(CACHE_KEY_PREFIX))
                .collect();

            let currencies: Vec<String> = keys
                .iter()
                .filter(|key| Self::is_meta_key(key))
                .map(|key| key.trim_start_matches(&format!("{}-", CACHE_KEY_PREFIX)).to_string())
                .collect();

            let mut total_size = 0;
            for key in &keys {
                total_size += self.store.get_item(key)?.map_or(0, |value| value.len());
            }

            Ok(CacheStats {
                size: currencies.len(),
                currencies,
                total_size,
            })
        };

        collect().unwrap_or_else(|e| {
            warn!(error = %e, "failed to collect cache stats");
            CacheStats::default()
        })
    }

    /// Drops the oldest entries until at most `max_entries` remain
    ///
    /// Entries with unreadable metadata count as oldest. On equal timestamps
    /// `just_written` is kept.
    fn evict_oldest(&self, just_written: &str) -> Result<(), CacheError> {
        let mut entries: Vec<(String, i64)> = self
            .store
            .keys()?
            .into_iter()
            .filter(|key| Self::is_meta_key(key))
            .map(|key| {
                let timestamp = self
                    .read_metadata(&key)
                    .ok()
                    .flatten()
                    .map_or(0, |metadata| metadata.timestamp);
                (key, timestamp)
            })
            .collect();

        if entries.len() <= self.config.max_entries {
            return Ok(());
        }

        // Newest first, then the entry just written, then by key
        entries.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| (b.0 == just_written).cmp(&(a.0 == just_written)))
                .then_with(|| a.0.cmp(&b.0))
        });

        for (key, _) in entries.split_off(self.config.max_entries) {
            debug!(key = %key, "evicting cache entry");
            self.store.remove_item(&key)?;
            self.store.remove_item(&Self::data_key(&key))?;
        }

        Ok(())
    }
}

fn timestamp_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
