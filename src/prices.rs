//! Price lookups with cache and static fallback
//!
//! `PriceService` tries the live API first, retrying transient failures a
//! bounded number of times. When the API stays unavailable or answers 429 it
//! serves the most recent cached prices, and failing that the built-in
//! snapshot converted into the requested currency.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{info, warn};

use crate::cache::PriceCache;
use crate::clock::{Clock, SystemClock};
use crate::data::{
    adjust_prices_for_currency, fallback_prices, CoinDetail, Currency, CurrencyRecord, DataSource,
    FetchError, MarketClient, PriceSnapshot,
};

/// Number of coins requested from the markets endpoint
pub const DEFAULT_LIMIT: usize = 20;

/// How old cached prices may be and still be served after a failed fetch
pub const DEFAULT_MAX_FALLBACK_AGE_HOURS: i64 = 24;

/// Bounded retry for transient API failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause between attempts
    pub interval: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: StdDuration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            interval: StdDuration::ZERO,
        }
    }
}

/// Fetches prices, degrading to cached or static data on failure
#[derive(Debug, Clone)]
pub struct PriceService {
    client: MarketClient,
    cache: Option<PriceCache>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    limit: usize,
    max_fallback_age: Duration,
}

impl PriceService {
    pub fn new(client: MarketClient, cache: Option<PriceCache>) -> Self {
        Self {
            client,
            cache,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            limit: DEFAULT_LIMIT,
            max_fallback_age: Duration::hours(DEFAULT_MAX_FALLBACK_AGE_HOURS),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the current price list for `currency`
    ///
    /// Never fails: the worst case is the built-in snapshot, tagged
    /// [`DataSource::Fallback`].
    pub async fn fetch_prices(&self, currency: Currency) -> PriceSnapshot {
        match self.fetch_live(currency).await {
            Ok(records) => {
                if let Some(ref cache) = self.cache {
                    if !records.is_empty() {
                        cache.set(currency.api_code(), &records);
                    }
                }
                PriceSnapshot {
                    currency,
                    records,
                    source: DataSource::Live,
                    as_of: self.clock.now(),
                }
            }
            Err(e) => {
                warn!(%currency, error = %e, "live price fetch failed, using fallback data");
                self.fallback(currency)
            }
        }
    }

    /// Fetches details for one coin; unknown ids surface as `FetchError::NotFound`
    pub async fn fetch_coin(&self, id: &str) -> Result<CoinDetail, FetchError> {
        self.client.fetch_coin(id).await
    }

    async fn fetch_live(&self, currency: Currency) -> Result<Vec<CurrencyRecord>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.client.fetch_markets(currency, self.limit).await {
                Ok(records) => return Ok(records),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        %currency,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "price fetch failed, retrying"
                    );
                    tokio::time::sleep(self.retry.interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cached prices if recent enough, else the static snapshot
    fn fallback(&self, currency: Currency) -> PriceSnapshot {
        if let Some(ref cache) = self.cache {
            if let Some(cached) = cache.recent(currency.api_code(), self.max_fallback_age) {
                info!(%currency, cached_at = %cached.cached_at, "using cached data");
                return PriceSnapshot {
                    currency,
                    records: cached.records,
                    source: DataSource::Cache,
                    as_of: cached.cached_at,
                };
            }
        }

        let now = self.clock.now();
        PriceSnapshot {
            currency,
            records: adjust_prices_for_currency(&fallback_prices(now), currency),
            source: DataSource::Fallback,
            as_of: now,
        }
    }
}
